use crate::catalog::Collation;

#[derive(Clone, Debug)]
pub struct StorageConfig {
    pub default_partitions: usize,
    pub primary_key_indexes: bool,
    pub default_collation: Collation,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            default_partitions: 1,
            primary_key_indexes: false,
            default_collation: Collation::default(),
        }
    }
}
