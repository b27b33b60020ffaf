/// Origin tag used by the producer on the notifications channel.
pub const PRODUCER_ORIGIN: &str = "PRIMSERVER";

/// Builds a notification string of the form `ORIGIN : KIND : MESSAGE`.
pub fn status_string(origin: &str, kind: &str, message: &str) -> String {
    format!("{origin} : {kind} : {message}")
}

/// Shorthand for a producer `STATUS` notification.
pub fn producer_status(message: &str) -> String {
    status_string(PRODUCER_ORIGIN, "STATUS", message)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_status_notifications() {
        assert_eq!(
            producer_status("AWAITING INPUT"),
            "PRIMSERVER : STATUS : AWAITING INPUT"
        );
    }
}
