//! Postgres-backed catalog
//!
//! All statements target the `wrack` schema; the expected layout lives in
//! `schema.sql` at the crate root. Creation methods run in a transaction
//! and register files through the shared mountpoint machinery: each file
//! moves into the mountpoint for its object kind, renamed
//! `<object_id>_<original_name>`, and gets a checksummed `filepath` row.

use serde_json::Value;
use sqlx::postgres::{PgConnectOptions, PgPool, PgPoolOptions};
use sqlx::Row;
use std::collections::BTreeMap;
use std::path::PathBuf;
use std::time::Duration;

use async_trait::async_trait;
use wrack_core::{Config, Result, WrackError};

use crate::metadata::MetadataTemplate;
use crate::store::{DataStore, SUPPORTED_PARAMS_TABLES};
use crate::types::{Filepath, PreprocessedSpec, ProcessedSpec, ReferenceSpec, StoredFilepath};
use crate::util::{
    canonical_params_json, compute_checksum, prefixed_filename, scrub_data, transfer_file,
};

fn db_err(err: sqlx::Error) -> WrackError {
    match &err {
        sqlx::Error::Database(db)
            if matches!(db.kind(), sqlx::error::ErrorKind::UniqueViolation) =>
        {
            WrackError::Duplicate(db.message().to_string())
        }
        _ => WrackError::Database(err.to_string()),
    }
}

fn unknown_id(kind: &str, id: i64) -> WrackError {
    WrackError::UnknownId {
        kind: kind.to_string(),
        id,
    }
}

struct Mountpoint {
    id: i64,
    path: PathBuf,
}

/// Production catalog on Postgres.
pub struct PgStore {
    pool: PgPool,
    base_data_dir: PathBuf,
}

impl PgStore {
    /// Connect to the catalog named in the config.
    ///
    /// Establishes a first connection eagerly so an unreachable database
    /// fails startup instead of the first operation.
    pub async fn connect(config: &Config) -> Result<Self> {
        let pg = &config.postgres;
        tracing::debug!(
            "connecting to postgres {}@{}:{}/{}",
            pg.user,
            pg.host,
            pg.port,
            pg.database
        );

        let mut opts = PgConnectOptions::new()
            .host(&pg.host)
            .port(pg.port)
            .username(&pg.user)
            .database(&pg.database)
            .application_name("wrack");
        if let Some(password) = &pg.password {
            opts = opts.password(password);
        }

        let pool = PgPoolOptions::new()
            .max_connections(5)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(opts)
            .await
            .map_err(|e| WrackError::DatabaseUnavailable(e.to_string()))?;

        Ok(Self {
            pool,
            base_data_dir: config.base_data_dir(),
        })
    }

    async fn fetch_vocab(&self, sql: &str) -> Result<BTreeMap<String, i64>> {
        let rows = sqlx::query(sql).fetch_all(&self.pool).await.map_err(db_err)?;
        rows.into_iter()
            .map(|row| {
                let name: String = row.try_get(0).map_err(db_err)?;
                let id: i64 = row.try_get(1).map_err(db_err)?;
                Ok((name, id))
            })
            .collect()
    }

    async fn filepath_type_id(&self, fp_type: &str) -> Result<i64> {
        sqlx::query_scalar(
            "SELECT filepath_type_id FROM wrack.filepath_type WHERE filepath_type = $1",
        )
        .bind(fp_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or_else(|| WrackError::UnknownValue {
            value: fp_type.to_string(),
            table: "filepath_type".to_string(),
        })
    }

    async fn data_type_id(&self, data_type: &str) -> Result<i64> {
        sqlx::query_scalar("SELECT data_type_id FROM wrack.data_type WHERE data_type = $1")
            .bind(data_type)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| WrackError::UnknownValue {
                value: data_type.to_string(),
                table: "data_type".to_string(),
            })
    }

    async fn artifact_type_id(&self, artifact_type: &str) -> Result<i64> {
        sqlx::query_scalar(
            "SELECT artifact_type_id FROM wrack.artifact_type WHERE artifact_type = $1",
        )
        .bind(artifact_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or_else(|| WrackError::UnknownValue {
            value: artifact_type.to_string(),
            table: "artifact_type".to_string(),
        })
    }

    /// Latest active mountpoint for an object kind.
    async fn mountpoint(&self, data_type: &str) -> Result<Mountpoint> {
        let row = sqlx::query(
            "SELECT data_directory_id, mountpoint, subdirectory \
             FROM wrack.data_directory \
             WHERE data_type = $1 AND active \
             ORDER BY data_directory_id DESC LIMIT 1",
        )
        .bind(data_type)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?
        .ok_or_else(|| {
            WrackError::Database(format!("no active data directory for '{}'", data_type))
        })?;

        let id: i64 = row.try_get("data_directory_id").map_err(db_err)?;
        let mount: String = row.try_get("mountpoint").map_err(db_err)?;
        let subdirectory: String = row.try_get("subdirectory").map_err(db_err)?;

        let mut path = self.base_data_dir.join(mount);
        if !subdirectory.is_empty() {
            path = path.join(subdirectory);
        }
        Ok(Mountpoint { id, path })
    }

    /// Move `filepaths` into the mountpoint for `data_type` and insert a
    /// filepath row for each. Returns the new filepath IDs in input order.
    async fn insert_filepaths(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        object_id: i64,
        data_type: &str,
        filepaths: &[Filepath],
    ) -> Result<Vec<i64>> {
        let mount = self.mountpoint(data_type).await?;
        std::fs::create_dir_all(&mount.path)?;

        let mut ids = Vec::with_capacity(filepaths.len());
        for fp in filepaths {
            let fp_type_id = self.filepath_type_id(&fp.fp_type).await?;
            let dest_name = prefixed_filename(object_id, &fp.path)?;
            let dest = mount.path.join(&dest_name);
            transfer_file(&fp.path, &dest, false)?;
            let checksum = compute_checksum(&dest)?;

            let filepath_id: i64 = sqlx::query_scalar(
                "INSERT INTO wrack.filepath \
                 (filepath, filepath_type_id, checksum, data_directory_id) \
                 VALUES ($1, $2, $3, $4) RETURNING filepath_id",
            )
            .bind(&dest_name)
            .bind(fp_type_id)
            .bind(checksum as i64)
            .bind(mount.id)
            .fetch_one(&mut **tx)
            .await
            .map_err(db_err)?;
            ids.push(filepath_id);
        }
        Ok(ids)
    }

    async fn link_filepaths(
        &self,
        tx: &mut sqlx::Transaction<'_, sqlx::Postgres>,
        link_table: &str,
        object_column: &str,
        object_id: i64,
        filepath_ids: &[i64],
    ) -> Result<()> {
        // link_table and object_column come from call sites, never input
        let sql = format!(
            "INSERT INTO wrack.{} ({}, filepath_id) VALUES ($1, $2)",
            link_table, object_column
        );
        for filepath_id in filepath_ids {
            sqlx::query(&sql)
                .bind(object_id)
                .bind(filepath_id)
                .execute(&mut **tx)
                .await
                .map_err(db_err)?;
        }
        Ok(())
    }

    async fn ensure_study(&self, study_id: i64) -> Result<()> {
        if self.study_exists(study_id).await? {
            Ok(())
        } else {
            Err(unknown_id("Study", study_id))
        }
    }

    async fn ensure_preprocessed(&self, preprocessed_data_id: i64) -> Result<()> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM wrack.preprocessed_data \
             WHERE preprocessed_data_id = $1)",
        )
        .bind(preprocessed_data_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        if exists {
            Ok(())
        } else {
            Err(unknown_id("Preprocessed data", preprocessed_data_id))
        }
    }
}

#[async_trait]
impl DataStore for PgStore {
    async fn ping(&self) -> Result<()> {
        sqlx::query("SELECT 1")
            .execute(&self.pool)
            .await
            .map_err(|e| WrackError::DatabaseUnavailable(e.to_string()))?;
        Ok(())
    }

    async fn filepath_types(&self) -> Result<BTreeMap<String, i64>> {
        self.fetch_vocab("SELECT filepath_type, filepath_type_id FROM wrack.filepath_type")
            .await
    }

    async fn data_types(&self) -> Result<BTreeMap<String, i64>> {
        self.fetch_vocab("SELECT data_type, data_type_id FROM wrack.data_type")
            .await
    }

    async fn artifact_types(&self) -> Result<BTreeMap<String, i64>> {
        self.fetch_vocab("SELECT artifact_type, artifact_type_id FROM wrack.artifact_type")
            .await
    }

    async fn create_study(&self, owner: &str, title: &str, info: &Value) -> Result<i64> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let owner_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM wrack.platform_user WHERE email = $1)",
        )
        .bind(owner)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;
        if !owner_exists {
            return Err(WrackError::UnknownValue {
                value: owner.to_string(),
                table: "platform_user".to_string(),
            });
        }

        let study_id: i64 = sqlx::query_scalar(
            "INSERT INTO wrack.study (email, title, info) \
             VALUES ($1, $2, $3) RETURNING study_id",
        )
        .bind(owner)
        .bind(scrub_data(title))
        .bind(sqlx::types::Json(info))
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(study_id)
    }

    async fn create_raw_data(
        &self,
        filetype: &str,
        study_ids: &[i64],
        filepaths: &[Filepath],
    ) -> Result<i64> {
        let artifact_type_id = self.artifact_type_id(filetype).await?;
        for &study_id in study_ids {
            self.ensure_study(study_id).await?;
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let raw_data_id: i64 = sqlx::query_scalar(
            "INSERT INTO wrack.raw_data (artifact_type_id) \
             VALUES ($1) RETURNING raw_data_id",
        )
        .bind(artifact_type_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        for &study_id in study_ids {
            sqlx::query(
                "INSERT INTO wrack.study_raw_data (study_id, raw_data_id) VALUES ($1, $2)",
            )
            .bind(study_id)
            .bind(raw_data_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        let filepath_ids = self
            .insert_filepaths(&mut tx, raw_data_id, "raw_data", filepaths)
            .await?;
        self.link_filepaths(&mut tx, "raw_data_filepath", "raw_data_id", raw_data_id, &filepath_ids)
            .await?;

        tx.commit().await.map_err(db_err)?;
        Ok(raw_data_id)
    }

    async fn create_preprocessed_data(&self, spec: &PreprocessedSpec) -> Result<i64> {
        if !SUPPORTED_PARAMS_TABLES.contains(&spec.params_table.as_str()) {
            return Err(WrackError::InvalidInput(format!(
                "table '{}' not supported, choose from: {}",
                spec.params_table,
                SUPPORTED_PARAMS_TABLES.join(", ")
            )));
        }
        self.ensure_study(spec.study_id).await?;

        // The data type comes either directly or through a prep template.
        let data_type_id = match (&spec.data_type, spec.prep_template_id) {
            (Some(data_type), _) => self.data_type_id(data_type).await?,
            (None, Some(prep_id)) => sqlx::query_scalar(
                "SELECT data_type_id FROM wrack.prep_template WHERE prep_template_id = $1",
            )
            .bind(prep_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)?
            .ok_or_else(|| unknown_id("Prep template", prep_id))?,
            (None, None) => {
                return Err(WrackError::InvalidInput(
                    "either a data type or a prep template is required".to_string(),
                ))
            }
        };

        let insdc_status = if spec.submitted_to_insdc {
            "submitted"
        } else {
            "not submitted"
        };

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let preprocessed_data_id: i64 = sqlx::query_scalar(
            "INSERT INTO wrack.preprocessed_data \
             (preprocessed_params_table, preprocessed_params_id, data_type_id, \
              prep_template_id, submitted_to_insdc_status) \
             VALUES ($1, $2, $3, $4, $5) RETURNING preprocessed_data_id",
        )
        .bind(&spec.params_table)
        .bind(spec.params_id)
        .bind(data_type_id)
        .bind(spec.prep_template_id)
        .bind(insdc_status)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        sqlx::query(
            "INSERT INTO wrack.study_preprocessed_data (study_id, preprocessed_data_id) \
             VALUES ($1, $2)",
        )
        .bind(spec.study_id)
        .bind(preprocessed_data_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        let filepath_ids = self
            .insert_filepaths(&mut tx, preprocessed_data_id, "preprocessed_data", &spec.filepaths)
            .await?;
        self.link_filepaths(
            &mut tx,
            "preprocessed_filepath",
            "preprocessed_data_id",
            preprocessed_data_id,
            &filepath_ids,
        )
        .await?;

        tx.commit().await.map_err(db_err)?;
        Ok(preprocessed_data_id)
    }

    async fn create_processed_data(&self, spec: &ProcessedSpec) -> Result<i64> {
        if !SUPPORTED_PARAMS_TABLES.contains(&spec.params_table.as_str()) {
            return Err(WrackError::InvalidInput(format!(
                "table '{}' not supported, choose from: {}",
                spec.params_table,
                SUPPORTED_PARAMS_TABLES.join(", ")
            )));
        }
        if spec.preprocessed_data_id.is_none() && spec.study_id.is_none() {
            return Err(WrackError::InvalidInput(
                "a processed data entry needs a preprocessed data or study parent".to_string(),
            ));
        }
        if let Some(preprocessed_data_id) = spec.preprocessed_data_id {
            self.ensure_preprocessed(preprocessed_data_id).await?;
        }
        if let Some(study_id) = spec.study_id {
            self.ensure_study(study_id).await?;
        }

        let processed_date = spec
            .processed_date
            .unwrap_or_else(|| chrono::Utc::now().naive_utc());

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let processed_data_id: i64 = sqlx::query_scalar(
            "INSERT INTO wrack.processed_data \
             (processed_params_table, processed_params_id, processed_date) \
             VALUES ($1, $2, $3) RETURNING processed_data_id",
        )
        .bind(&spec.params_table)
        .bind(spec.params_id)
        .bind(processed_date)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        if let Some(preprocessed_data_id) = spec.preprocessed_data_id {
            sqlx::query(
                "INSERT INTO wrack.preprocessed_processed_data \
                 (preprocessed_data_id, processed_data_id) VALUES ($1, $2)",
            )
            .bind(preprocessed_data_id)
            .bind(processed_data_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        } else if let Some(study_id) = spec.study_id {
            sqlx::query(
                "INSERT INTO wrack.study_processed_data (study_id, processed_data_id) \
                 VALUES ($1, $2)",
            )
            .bind(study_id)
            .bind(processed_data_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        let filepath_ids = self
            .insert_filepaths(&mut tx, processed_data_id, "processed_data", &spec.filepaths)
            .await?;
        self.link_filepaths(
            &mut tx,
            "processed_filepath",
            "processed_data_id",
            processed_data_id,
            &filepath_ids,
        )
        .await?;

        tx.commit().await.map_err(db_err)?;
        Ok(processed_data_id)
    }

    async fn create_sample_template(
        &self,
        study_id: i64,
        template: &MetadataTemplate,
    ) -> Result<i64> {
        self.ensure_study(study_id).await?;

        let already_loaded: bool = sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM wrack.study_sample WHERE study_id = $1)",
        )
        .bind(study_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)?;
        if already_loaded {
            return Err(WrackError::Duplicate(format!(
                "sample template for study {} already exists",
                study_id
            )));
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;
        for record in template.samples() {
            sqlx::query(
                "INSERT INTO wrack.study_sample (study_id, sample_id, metadata) \
                 VALUES ($1, $2, $3)",
            )
            .bind(study_id)
            .bind(&record.sample_id)
            .bind(sqlx::types::Json(record.values_json()))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }
        tx.commit().await.map_err(db_err)?;

        // A sample template is keyed by its study.
        Ok(study_id)
    }

    async fn create_prep_template(
        &self,
        study_id: i64,
        raw_data_id: Option<i64>,
        data_type: &str,
        template: &MetadataTemplate,
    ) -> Result<i64> {
        self.ensure_study(study_id).await?;
        let data_type_id = self.data_type_id(data_type).await?;

        if let Some(raw_data_id) = raw_data_id {
            let exists: bool = sqlx::query_scalar(
                "SELECT EXISTS (SELECT 1 FROM wrack.raw_data WHERE raw_data_id = $1)",
            )
            .bind(raw_data_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)?;
            if !exists {
                return Err(unknown_id("Raw data", raw_data_id));
            }
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let prep_template_id: i64 = sqlx::query_scalar(
            "INSERT INTO wrack.prep_template (study_id, raw_data_id, data_type_id) \
             VALUES ($1, $2, $3) RETURNING prep_template_id",
        )
        .bind(study_id)
        .bind(raw_data_id)
        .bind(data_type_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        for record in template.samples() {
            sqlx::query(
                "INSERT INTO wrack.prep_template_sample (prep_template_id, sample_id, metadata) \
                 VALUES ($1, $2, $3)",
            )
            .bind(prep_template_id)
            .bind(&record.sample_id)
            .bind(sqlx::types::Json(record.values_json()))
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;
        }

        tx.commit().await.map_err(db_err)?;
        Ok(prep_template_id)
    }

    async fn create_reference(&self, spec: &ReferenceSpec) -> Result<i64> {
        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let reference_id: i64 = sqlx::query_scalar(
            "INSERT INTO wrack.reference (reference_name, reference_version) \
             VALUES ($1, $2) RETURNING reference_id",
        )
        .bind(scrub_data(&spec.name))
        .bind(scrub_data(&spec.version))
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        let mut filepaths = vec![Filepath::new(&spec.sequence_fp, "reference_seqs")];
        let taxonomy_idx = spec.taxonomy_fp.as_ref().map(|path| {
            filepaths.push(Filepath::new(path, "reference_tax"));
            filepaths.len() - 1
        });
        let tree_idx = spec.tree_fp.as_ref().map(|path| {
            filepaths.push(Filepath::new(path, "reference_tree"));
            filepaths.len() - 1
        });

        let filepath_ids = self
            .insert_filepaths(&mut tx, reference_id, "reference", &filepaths)
            .await?;

        sqlx::query(
            "UPDATE wrack.reference \
             SET sequence_filepath_id = $1, taxonomy_filepath_id = $2, tree_filepath_id = $3 \
             WHERE reference_id = $4",
        )
        .bind(filepath_ids[0])
        .bind(taxonomy_idx.map(|i| filepath_ids[i]))
        .bind(tree_idx.map(|i| filepath_ids[i]))
        .bind(reference_id)
        .execute(&mut *tx)
        .await
        .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(reference_id)
    }

    async fn create_parameters(&self, table: &str, name: &str, values: &Value) -> Result<i64> {
        if !SUPPORTED_PARAMS_TABLES.contains(&table) {
            return Err(WrackError::InvalidInput(format!(
                "table '{}' not supported, choose from: {}",
                table,
                SUPPORTED_PARAMS_TABLES.join(", ")
            )));
        }

        // table is whitelisted above, never raw input
        let sql = format!(
            "INSERT INTO wrack.{} (param_set_name, parameters) \
             VALUES ($1, $2::jsonb) RETURNING param_set_id",
            table
        );
        sqlx::query_scalar(&sql)
            .bind(scrub_data(name))
            .bind(canonical_params_json(values)?)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn study_exists(&self, study_id: i64) -> Result<bool> {
        sqlx::query_scalar("SELECT EXISTS (SELECT 1 FROM wrack.study WHERE study_id = $1)")
            .bind(study_id)
            .fetch_one(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn uploads_dir(&self, study_id: i64) -> Result<PathBuf> {
        let mount = self.mountpoint("uploads").await?;
        let dir = mount.path.join(study_id.to_string());
        std::fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    async fn latest_preprocessed_data(&self, study_id: i64) -> Result<Option<i64>> {
        self.ensure_study(study_id).await?;
        sqlx::query_scalar(
            "SELECT preprocessed_data_id FROM wrack.study_preprocessed_data \
             WHERE study_id = $1 ORDER BY preprocessed_data_id DESC LIMIT 1",
        )
        .bind(study_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn preprocessed_filepaths(
        &self,
        preprocessed_data_id: i64,
    ) -> Result<Vec<StoredFilepath>> {
        self.ensure_preprocessed(preprocessed_data_id).await?;

        let rows = sqlx::query(
            "SELECT fp.filepath_id, fp.filepath, ft.filepath_type, \
                    dd.mountpoint, dd.subdirectory \
             FROM wrack.preprocessed_filepath pf \
             JOIN wrack.filepath fp ON fp.filepath_id = pf.filepath_id \
             JOIN wrack.filepath_type ft ON ft.filepath_type_id = fp.filepath_type_id \
             JOIN wrack.data_directory dd ON dd.data_directory_id = fp.data_directory_id \
             WHERE pf.preprocessed_data_id = $1 \
             ORDER BY fp.filepath_id",
        )
        .bind(preprocessed_data_id)
        .fetch_all(&self.pool)
        .await
        .map_err(db_err)?;

        rows.into_iter()
            .map(|row| {
                let id: i64 = row.try_get("filepath_id").map_err(db_err)?;
                let name: String = row.try_get("filepath").map_err(db_err)?;
                let fp_type: String = row.try_get("filepath_type").map_err(db_err)?;
                let mount: String = row.try_get("mountpoint").map_err(db_err)?;
                let subdirectory: String = row.try_get("subdirectory").map_err(db_err)?;

                let mut path = self.base_data_dir.join(mount);
                if !subdirectory.is_empty() {
                    path = path.join(subdirectory);
                }
                Ok(StoredFilepath {
                    id,
                    path: path.join(name),
                    fp_type,
                })
            })
            .collect()
    }

    async fn update_preprocessed_filepaths(
        &self,
        preprocessed_data_id: i64,
        filepaths: &[Filepath],
    ) -> Result<()> {
        self.ensure_preprocessed(preprocessed_data_id).await?;

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        // Old filepath rows stay in the catalog for provenance; only the
        // links move to the replacement files.
        sqlx::query("DELETE FROM wrack.preprocessed_filepath WHERE preprocessed_data_id = $1")
            .bind(preprocessed_data_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        let filepath_ids = self
            .insert_filepaths(&mut tx, preprocessed_data_id, "preprocessed_data", filepaths)
            .await?;
        self.link_filepaths(
            &mut tx,
            "preprocessed_filepath",
            "preprocessed_data_id",
            preprocessed_data_id,
            &filepath_ids,
        )
        .await?;

        tx.commit().await.map_err(db_err)?;
        Ok(())
    }

    async fn set_ebi_status(&self, preprocessed_data_id: i64, status: &str) -> Result<()> {
        let result = sqlx::query(
            "UPDATE wrack.preprocessed_data SET submitted_to_insdc_status = $1 \
             WHERE preprocessed_data_id = $2",
        )
        .bind(status)
        .bind(preprocessed_data_id)
        .execute(&self.pool)
        .await
        .map_err(db_err)?;

        if result.rows_affected() == 0 {
            return Err(unknown_id("Preprocessed data", preprocessed_data_id));
        }
        Ok(())
    }

    async fn prep_template_exists(&self, prep_id: i64) -> Result<bool> {
        sqlx::query_scalar(
            "SELECT EXISTS (SELECT 1 FROM wrack.prep_template WHERE prep_template_id = $1)",
        )
        .bind(prep_id)
        .fetch_one(&self.pool)
        .await
        .map_err(db_err)
    }

    async fn prep_template_study(&self, prep_id: i64) -> Result<Option<i64>> {
        sqlx::query_scalar("SELECT study_id FROM wrack.prep_template WHERE prep_template_id = $1")
            .bind(prep_id)
            .fetch_optional(&self.pool)
            .await
            .map_err(db_err)
    }

    async fn prep_template_artifact(&self, prep_id: i64) -> Result<Option<i64>> {
        let artifact: Option<Option<i64>> = sqlx::query_scalar(
            "SELECT artifact_id FROM wrack.prep_template WHERE prep_template_id = $1",
        )
        .bind(prep_id)
        .fetch_optional(&self.pool)
        .await
        .map_err(db_err)?;
        Ok(artifact.flatten())
    }

    async fn create_artifact(
        &self,
        prep_id: i64,
        artifact_type: &str,
        filepaths: &[Filepath],
    ) -> Result<i64> {
        let artifact_type_id = self.artifact_type_id(artifact_type).await?;
        if !self.prep_template_exists(prep_id).await? {
            return Err(unknown_id("Prep template", prep_id));
        }
        if let Some(artifact_id) = self.prep_template_artifact(prep_id).await? {
            return Err(WrackError::Duplicate(format!(
                "prep template {} already has artifact {}",
                prep_id, artifact_id
            )));
        }

        let mut tx = self.pool.begin().await.map_err(db_err)?;

        let artifact_id: i64 = sqlx::query_scalar(
            "INSERT INTO wrack.artifact (artifact_type_id) VALUES ($1) RETURNING artifact_id",
        )
        .bind(artifact_type_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(db_err)?;

        let filepath_ids = self
            .insert_filepaths(&mut tx, artifact_id, artifact_type, filepaths)
            .await?;
        self.link_filepaths(&mut tx, "artifact_filepath", "artifact_id", artifact_id, &filepath_ids)
            .await?;

        sqlx::query("UPDATE wrack.prep_template SET artifact_id = $1 WHERE prep_template_id = $2")
            .bind(artifact_id)
            .bind(prep_id)
            .execute(&mut *tx)
            .await
            .map_err(db_err)?;

        tx.commit().await.map_err(db_err)?;
        Ok(artifact_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::DataStore;
    use serde_json::json;

    #[tokio::test]
    #[ignore] // Requires a Postgres instance initialized with schema.sql and WRACK_CONFIG_FP set
    async fn test_study_round_trip_against_live_catalog() {
        let config = Config::from_env().unwrap();
        let store = PgStore::connect(&config).await.unwrap();
        store.ping().await.unwrap();

        let vocab = store.vocabularies().await.unwrap();
        assert!(vocab.filepath_types.contains_key("raw_forward_seqs"));
        assert!(vocab.data_types.contains_key("16S"));

        let study_id = store
            .create_study(
                "test@wrack.example",
                "Live round trip study",
                &json!({"principal_investigator": "Knight"}),
            )
            .await
            .unwrap();
        assert!(store.study_exists(study_id).await.unwrap());
        assert_eq!(
            store.latest_preprocessed_data(study_id).await.unwrap(),
            None
        );
    }
}
