/// Key-value medium holding one JSON blob per key.
///
/// A missing key reads as `None`; callers decide what the empty value is.
pub trait KeyValueStore: Send + Sync + 'static {
    type Error: std::error::Error + Send + Sync + 'static;

    fn get(&self, key: &str) -> Result<Option<String>, Self::Error>;
    fn put(&self, key: &str, value: &str) -> Result<(), Self::Error>;
    fn remove(&self, key: &str) -> Result<(), Self::Error>;
}
