//! Composers - MessageComposer の実装
//!
//! 2 種類のメッセージ形状を持つ:
//! - PlainResendComposer: 定型文のみ
//! - BounceReasonComposer: 前回の失敗理由を本文に含める
//!
//! どちらも宛先は NotifyTarget で決まる。

use crate::domain::Candidate;
use crate::ports::{MessageComposer, NotifyTarget, OutgoingMessage};

pub const FALLBACK_SUBJECT: &str = "Your previous email subject";
pub const RESEND_BODY: &str = "This is a resend of your previous email content.";
pub const NO_REASON_AVAILABLE: &str = "No bounce reason available";

fn resend_subject(candidate: &Candidate) -> String {
    let original = candidate
        .subject
        .as_deref()
        .filter(|s| !s.trim().is_empty())
        .unwrap_or(FALLBACK_SUBJECT);
    format!("Resending: {original}")
}

#[derive(Debug, Clone, Default)]
pub struct PlainResendComposer {
    target: NotifyTarget,
}

impl PlainResendComposer {
    pub fn new(target: NotifyTarget) -> Self {
        Self { target }
    }
}

impl MessageComposer for PlainResendComposer {
    fn compose(&self, candidate: &Candidate, _bounce_reason: Option<&str>) -> OutgoingMessage {
        OutgoingMessage {
            from: candidate.from_address.clone(),
            to: self.target.resolve(candidate).to_string(),
            subject: resend_subject(candidate),
            content: RESEND_BODY.to_string(),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct BounceReasonComposer {
    target: NotifyTarget,
}

impl BounceReasonComposer {
    pub fn new(target: NotifyTarget) -> Self {
        Self { target }
    }
}

impl MessageComposer for BounceReasonComposer {
    fn wants_bounce_reason(&self) -> bool {
        true
    }

    fn compose(&self, candidate: &Candidate, bounce_reason: Option<&str>) -> OutgoingMessage {
        let reason = bounce_reason.unwrap_or(NO_REASON_AVAILABLE);
        OutgoingMessage {
            from: candidate.from_address.clone(),
            to: self.target.resolve(candidate).to_string(),
            subject: resend_subject(candidate),
            content: format!(
                "{RESEND_BODY}\n\nOriginal recipient: {}\nReason for the previous failure: {reason}",
                candidate.to_address
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::MessageId;
    use rstest::rstest;

    fn candidate(subject: Option<&str>) -> Candidate {
        Candidate {
            message_id: MessageId::from("m1"),
            from_address: "noreply@example.com".into(),
            to_address: "user@example.com".into(),
            subject: subject.map(str::to_string),
            send_attempts: 0,
        }
    }

    #[rstest]
    #[case::with_subject(Some("Invoice #42"), "Resending: Invoice #42")]
    #[case::without_subject(None, "Resending: Your previous email subject")]
    #[case::blank_subject(Some("  "), "Resending: Your previous email subject")]
    fn subject_mentions_original(#[case] subject: Option<&str>, #[case] expected: &str) {
        let msg = PlainResendComposer::default().compose(&candidate(subject), None);
        assert_eq!(msg.subject, expected);
    }

    #[test]
    fn plain_composer_targets_operator_when_configured() {
        let composer = PlainResendComposer::new(NotifyTarget::Operator("ops@example.com".into()));
        let msg = composer.compose(&candidate(None), None);
        assert_eq!(msg.to, "ops@example.com");
        assert_eq!(msg.from, "noreply@example.com");
        assert_eq!(msg.content, RESEND_BODY);
        assert!(!composer.wants_bounce_reason());
    }

    #[test]
    fn bounce_composer_includes_reason() {
        let composer = BounceReasonComposer::default();
        let msg = composer.compose(&candidate(Some("Hi")), Some("550 mailbox unavailable"));
        assert_eq!(msg.to, "user@example.com");
        assert!(msg.content.contains("550 mailbox unavailable"));
        assert!(composer.wants_bounce_reason());
    }

    #[test]
    fn bounce_composer_uses_sentinel_without_reason() {
        let msg = BounceReasonComposer::default().compose(&candidate(None), None);
        assert!(msg.content.ends_with(NO_REASON_AVAILABLE));
    }
}
