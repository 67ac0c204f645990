use chrono::Utc;
use rand::{distributions::Alphanumeric, thread_rng, Rng};

pub fn random_string(length: usize) -> String {
    let mut rng = thread_rng();

    std::iter::repeat(())
        .map(|_| rng.sample(Alphanumeric) as char)
        .take(length)
        .collect()
}

/// Short uppercase identifier used in room URLs.
pub fn random_room_id() -> String {
    random_string(8).to_uppercase()
}

/// Milliseconds since the unix epoch, the timestamp format of the wire protocol.
pub fn epoch_ms() -> u64 {
    Utc::now().timestamp_millis() as u64
}
