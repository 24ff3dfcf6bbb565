use super::{concentration, extract_records, load_crosswalk, load_tables, prepare_businesses};
use crate::config::toml_config::TomlConfig;
use crate::core::crosswalk::{join_by_zip, zip_fips_from_records};
use crate::core::normalize::FieldNormalizer;
use crate::core::tables::read_records_from_path;
use crate::core::{Pipeline, Record, Storage, TransformResult};
use crate::domain::model::{CzoneTable, ZipFips};
use crate::utils::error::Result;
use crate::utils::validation;

/// Places businesses by ZIP code through a ZIP-to-county reference table.
/// No network access.
pub struct ZipPipeline<S: Storage> {
    storage: S,
    config: TomlConfig,
}

impl<S: Storage> ZipPipeline<S> {
    pub fn new(storage: S, config: TomlConfig) -> Self {
        Self { storage, config }
    }

    fn load_zip_reference(&self) -> Result<Vec<ZipFips>> {
        let reference = validation::validate_required_field("zip_reference", &self.config.zip_reference)?;
        let mut records = read_records_from_path(&reference.path)?;
        FieldNormalizer::zip_reference().normalize_all(&mut records);

        let zips = zip_fips_from_records(&records);
        if zips.len() < records.len() {
            tracing::warn!(
                "Dropped {} ZIP reference rows without usable zipcode/statefips/countyfips",
                records.len() - zips.len()
            );
        }
        tracing::info!("📮 ZIP reference {}: {} ZIP codes", reference.path, zips.len());
        Ok(zips)
    }
}

#[async_trait::async_trait]
impl<S: Storage> Pipeline for ZipPipeline<S> {
    async fn extract(&self) -> Result<Vec<Record>> {
        extract_records(&self.storage, &self.config).await
    }

    async fn transform(&self, data: Vec<Record>) -> Result<TransformResult> {
        let businesses = prepare_businesses(&data);
        drop(data);

        let zips = self.load_zip_reference()?;
        let crosswalk = load_crosswalk(&self.config)?;
        let zip_mappings = crosswalk.map_zips(&zips);
        let analysis_rows = join_by_zip(&businesses, &zip_mappings);
        tracing::info!(
            "🔄 {} businesses, {} in a commuting zone by ZIP",
            businesses.len(),
            analysis_rows.len()
        );

        let (complete_rows, index_rows) = concentration(&analysis_rows);

        Ok(TransformResult {
            businesses: businesses.len(),
            geocode_responses: None,
            fips_mappings: Vec::new(),
            czone_table: CzoneTable::ByZip(zip_mappings),
            analysis_rows,
            complete_rows,
            index_rows,
        })
    }

    async fn load(&self, result: TransformResult) -> Result<String> {
        load_tables(&self.storage, &self.config, &result).await
    }
}
