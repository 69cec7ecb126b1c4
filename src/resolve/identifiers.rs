use std::collections::HashMap;

/// Hands out aliases (`t0`, `t1`, `q0`, ...) for one query compilation.
///
/// Counters are kept per prefix and never reset while the generator lives, so
/// an alias is never handed out twice.
#[derive(Debug, Clone)]
pub struct UniqueIdentifierGenerator {
    table_prefix: String,
    sub_statement_prefix: String,
    counters: HashMap<String, usize>,
}

impl Default for UniqueIdentifierGenerator {
    fn default() -> Self {
        Self::new("t", "q")
    }
}

impl UniqueIdentifierGenerator {
    pub fn new(table_prefix: impl Into<String>, sub_statement_prefix: impl Into<String>) -> Self {
        Self {
            table_prefix: table_prefix.into(),
            sub_statement_prefix: sub_statement_prefix.into(),
            counters: HashMap::new(),
        }
    }

    pub fn get_unique_identifier(&mut self, prefix: &str) -> String {
        let counter = self.counters.entry(prefix.to_string()).or_insert(0);
        let id = format!("{}{}", prefix, counter);
        *counter += 1;
        id
    }

    /// Alias for a mapped table.
    pub fn table_alias(&mut self) -> String {
        let prefix = self.table_prefix.clone();
        self.get_unique_identifier(&prefix)
    }

    /// Alias for a derived table.
    pub fn sub_statement_alias(&mut self) -> String {
        let prefix = self.sub_statement_prefix.clone();
        self.get_unique_identifier(&prefix)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_counters_are_per_prefix() {
        let mut generator = UniqueIdentifierGenerator::default();
        assert_eq!(generator.table_alias(), "t0");
        assert_eq!(generator.table_alias(), "t1");
        assert_eq!(generator.sub_statement_alias(), "q0");
        assert_eq!(generator.get_unique_identifier("t"), "t2");
    }

    #[test]
    fn test_custom_prefixes() {
        let mut generator = UniqueIdentifierGenerator::new("tbl", "sub");
        assert_eq!(generator.table_alias(), "tbl0");
        assert_eq!(generator.sub_statement_alias(), "sub0");
    }
}
