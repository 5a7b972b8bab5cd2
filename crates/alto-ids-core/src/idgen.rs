/// Produces `prefix1`, `prefix2`, ... for one role of one document.
///
/// The generator knows nothing about identifiers already in use; callers
/// skip values that collide.
#[derive(Debug, Clone)]
pub struct IdGenerator {
    prefix: String,
    counter: u64,
}

impl IdGenerator {
    pub fn new(prefix: impl Into<String>) -> Self {
        Self {
            prefix: prefix.into(),
            counter: 1,
        }
    }
}

impl Iterator for IdGenerator {
    type Item = String;

    fn next(&mut self) -> Option<String> {
        let id = format!("{}{}", self.prefix, self.counter);
        self.counter += 1;
        Some(id)
    }
}
