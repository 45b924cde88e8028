//! Reserved MQTT topics of the classic (unnamed) device shadow.

use core::fmt::Write;

use super::AckStatus;

/// Long enough for `$aws/things/` + 128-byte thing name + suffix.
pub const TOPIC_LEN: usize = 192;

pub type Topic = heapless::String<TOPIC_LEN>;

const PREFIX: &str = "$aws/things/";
const UPDATE: &str = "/shadow/update";
const ACCEPTED: &str = "/accepted";
const REJECTED: &str = "/rejected";

fn build(thing: &str, suffix: &str) -> Topic {
    let mut t = Topic::new();
    // Thing names are capped at 128 bytes, so the write always fits.
    let _ = write!(t, "{PREFIX}{thing}{UPDATE}{suffix}");
    t
}

/// Topic the device publishes reported state to.
pub fn update(thing: &str) -> Topic {
    build(thing, "")
}

pub fn update_accepted(thing: &str) -> Topic {
    build(thing, ACCEPTED)
}

pub fn update_rejected(thing: &str) -> Topic {
    build(thing, REJECTED)
}

/// Map an incoming topic to an ack status for `thing`.
pub fn classify(thing: &str, topic: &str) -> Option<AckStatus> {
    let rest = topic
        .strip_prefix(PREFIX)?
        .strip_prefix(thing)?
        .strip_prefix(UPDATE)?;
    match rest {
        ACCEPTED => Some(AckStatus::Accepted),
        REJECTED => Some(AckStatus::Rejected),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn topic_names() {
        assert_eq!(update("t1").as_str(), "$aws/things/t1/shadow/update");
        assert_eq!(update_accepted("t1").as_str(), "$aws/things/t1/shadow/update/accepted");
        assert_eq!(update_rejected("t1").as_str(), "$aws/things/t1/shadow/update/rejected");
    }

    #[test]
    fn classify_ack_topics() {
        assert_eq!(classify("t1", "$aws/things/t1/shadow/update/accepted"), Some(AckStatus::Accepted));
        assert_eq!(classify("t1", "$aws/things/t1/shadow/update/rejected"), Some(AckStatus::Rejected));
        assert_eq!(classify("t1", "$aws/things/t1/shadow/update/delta"), None);
        assert_eq!(classify("t1", "$aws/things/t2/shadow/update/accepted"), None);
        assert_eq!(classify("t1", "$aws/things/t1/shadow/update"), None);
    }

    #[test]
    fn max_length_thing_fits() {
        let thing: String = "x".repeat(crate::config::THING_NAME_LEN);
        assert!(update_accepted(&thing).ends_with("/shadow/update/accepted"));
    }
}
