// src/catalog.rs
//! Каталог регионов
//!
//! Загружается один раз за прогон и дальше не меняется. Все стадии конвейера
//! получают его по ссылке, поэтому порядок регионов (по возрастанию id) един
//! для тайлов, иконок и границ.

use tracing::{debug, info, warn};

use crate::bounds::{CoordinateBounds, compute_bounds};
use crate::cache::{CacheSource, KeyTable, Region};
use crate::error::{ExportError, Result};

#[derive(Debug, Clone, Default)]
pub struct RegionCatalog {
    regions: Vec<Region>,
}

impl RegionCatalog {
    /// Загружает все регионы, для которых есть ключ
    ///
    /// Регион без ключа пропускается молча, регион с неподходящим ключом —
    /// с предупреждением. Пропущенные регионы не участвуют ни в тайлах,
    /// ни в иконках, ни в границах. Прочие ошибки хранилища фатальны.
    pub fn load_all<S: CacheSource + ?Sized>(source: &S, keys: &KeyTable) -> Result<Self> {
        let mut regions = Vec::new();
        let mut without_key = 0usize;
        let mut undecryptable = 0usize;

        for id in source.list_regions() {
            let Some(key) = keys.get(id) else {
                debug!(region = %id, "нет ключа, регион пропущен");
                without_key += 1;
                continue;
            };

            match source.load_region(id, key) {
                Ok(region) => regions.push(region),
                Err(err @ ExportError::Decryption { .. }) => {
                    warn!(region = %id, error = %err, "регион не расшифрован, пропущен");
                    undecryptable += 1;
                }
                Err(err) => return Err(err),
            }
        }

        info!(
            loaded = regions.len(),
            without_key, undecryptable, "каталог регионов загружен"
        );
        Ok(Self { regions })
    }

    /// Каталог из уже декодированных регионов (в заданном порядке)
    #[must_use]
    pub fn from_regions(regions: Vec<Region>) -> Self {
        Self { regions }
    }

    #[must_use]
    pub fn regions(&self) -> &[Region] {
        &self.regions
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.regions.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }

    pub fn bounds(&self) -> Result<CoordinateBounds> {
        compute_bounds(&self.regions)
    }
}
