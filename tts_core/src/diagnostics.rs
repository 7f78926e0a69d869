use tokio::sync::broadcast;

/// Failures the speech pipeline recovers from on its own, plus completed
/// playbacks. Published for observers; control flow never depends on them.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpeechDiagnostic {
    SynthesisFailed { text: String, reason: String },
    /// The first start attempt was refused; a muted retry follows.
    StartRejected { reason: String },
    PlaybackFailed { reason: String },
    Stopped,
    Played { text: String },
}

pub(crate) type DiagnosticSender = broadcast::Sender<SpeechDiagnostic>;

pub(crate) fn channel() -> DiagnosticSender {
    let (tx, _) = broadcast::channel(256);
    tx
}

pub(crate) fn publish(tx: &DiagnosticSender, diagnostic: SpeechDiagnostic) {
    // no subscribers is fine
    let _ = tx.send(diagnostic);
}
