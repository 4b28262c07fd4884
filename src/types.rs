pub mod audit;
pub mod documents;
pub mod folders;
pub mod notifications;
pub mod users;

/// Random opaque identifier, 16 lowercase hex digits.
pub(crate) fn new_id() -> String {
    let value: u64 = rand::random();
    format!("{:016x}", value)
}
