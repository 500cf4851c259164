//! PostgreSQL target store

use super::TargetStore;
use crate::db::{schema, DbError, DbResult};
use crate::models::{
    Id, LookupRow, NaturalKey, NewEntity, NewResource, NewResourceFile, NewSourceFile,
    ResourceBiocLink, ResourceTagLink, SpeciesRow, TableCount,
};
use async_trait::async_trait;
use biochub_common::types::EntityKind;
use sqlx::{PgPool, Postgres, QueryBuilder};
use std::collections::HashMap;
use tracing::debug;

/// Postgres caps a statement at 65535 bind parameters.
const MAX_BIND_PARAMS: usize = 65_000;

/// Table and natural-key column for kinds keyed by a single string.
fn named_table(kind: EntityKind) -> Option<(&'static str, &'static str)> {
    match kind {
        EntityKind::DataProvider => Some(("data_providers", "name")),
        EntityKind::User => Some(("users", "email")),
        EntityKind::Recipe => Some(("recipes", "name")),
        EntityKind::StorageLocation => Some(("storage_locations", "name")),
        EntityKind::Tag => Some(("tags", "tag")),
        EntityKind::Species | EntityKind::Genome => None,
    }
}

fn named_key(kind: EntityKind, value: String) -> Option<NaturalKey> {
    match kind {
        EntityKind::DataProvider => Some(NaturalKey::DataProvider(value)),
        EntityKind::User => Some(NaturalKey::User(value)),
        EntityKind::Recipe => Some(NaturalKey::Recipe(value)),
        EntityKind::StorageLocation => Some(NaturalKey::StorageLocation(value)),
        EntityKind::Tag => Some(NaturalKey::Tag(value)),
        EntityKind::Species | EntityKind::Genome => None,
    }
}

fn rows_per_statement(params_per_row: usize) -> usize {
    (MAX_BIND_PARAMS / params_per_row).max(1)
}

pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    async fn lookup(&self, sql: &'static str) -> DbResult<Vec<LookupRow>> {
        let rows = sqlx::query_as::<_, (i64, String)>(sql)
            .fetch_all(&self.pool)
            .await?;
        Ok(rows
            .into_iter()
            .map(|(id, name)| LookupRow { id, name })
            .collect())
    }
}

#[async_trait]
impl TargetStore for PgStore {
    async fn load_hubs(&self) -> DbResult<Vec<LookupRow>> {
        self.lookup("SELECT id, code FROM hubs ORDER BY id").await
    }

    async fn load_statuses(&self) -> DbResult<Vec<LookupRow>> {
        self.lookup("SELECT id, status FROM resource_statuses ORDER BY id")
            .await
    }

    async fn load_bioc_releases(&self) -> DbResult<Vec<LookupRow>> {
        self.lookup("SELECT id, version FROM bioc_releases ORDER BY id")
            .await
    }

    async fn load_species(&self) -> DbResult<Vec<SpeciesRow>> {
        let rows = sqlx::query_as::<_, (i64, String, i64)>(
            "SELECT id, scientific_name, taxonomy_id FROM species ORDER BY id",
        )
        .fetch_all(&self.pool)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(id, scientific_name, taxonomy_id)| SpeciesRow {
                id,
                scientific_name,
                taxonomy_id,
            })
            .collect())
    }

    async fn load_keys(&self, kind: EntityKind) -> DbResult<Vec<(NaturalKey, Id)>> {
        let keys = match kind {
            EntityKind::Species => {
                sqlx::query_as::<_, (i64, i64)>("SELECT taxonomy_id, id FROM species")
                    .fetch_all(&self.pool)
                    .await?
                    .into_iter()
                    .map(|(taxonomy_id, id)| (NaturalKey::Species { taxonomy_id }, id))
                    .collect()
            },
            EntityKind::Genome => sqlx::query_as::<_, (i64, String, i64)>(
                "SELECT species_id, genome_build, id FROM genomes",
            )
            .fetch_all(&self.pool)
            .await?
            .into_iter()
            .map(|(species_id, build, id)| (NaturalKey::Genome { species_id, build }, id))
            .collect(),
            _ => {
                let (table, column) = named_table(kind)
                    .ok_or_else(|| DbError::config(format!("no key column for {}", kind)))?;
                let sql = format!("SELECT {}, id FROM {}", column, table);
                sqlx::query_as::<_, (String, i64)>(&sql)
                    .fetch_all(&self.pool)
                    .await?
                    .into_iter()
                    .filter_map(|(value, id)| named_key(kind, value).map(|key| (key, id)))
                    .collect()
            },
        };
        Ok(keys)
    }

    async fn find_entity(&self, key: &NaturalKey) -> DbResult<Option<Id>> {
        let id = match key {
            NaturalKey::Species { taxonomy_id } => {
                sqlx::query_scalar::<_, i64>("SELECT id FROM species WHERE taxonomy_id = $1")
                    .bind(taxonomy_id)
                    .fetch_optional(&self.pool)
                    .await?
            },
            NaturalKey::Genome { species_id, build } => sqlx::query_scalar::<_, i64>(
                "SELECT id FROM genomes WHERE species_id = $1 AND genome_build = $2",
            )
            .bind(species_id)
            .bind(build)
            .fetch_optional(&self.pool)
            .await?,
            NaturalKey::DataProvider(value)
            | NaturalKey::User(value)
            | NaturalKey::Recipe(value)
            | NaturalKey::StorageLocation(value)
            | NaturalKey::Tag(value) => {
                let (table, column) = named_table(key.kind())
                    .ok_or_else(|| DbError::config(format!("no key column for {}", key.kind())))?;
                let sql = format!("SELECT id FROM {} WHERE {} = $1", table, column);
                sqlx::query_scalar::<_, i64>(&sql)
                    .bind(value)
                    .fetch_optional(&self.pool)
                    .await?
            },
        };
        Ok(id)
    }

    async fn insert_entity(&self, entity: &NewEntity) -> DbResult<Id> {
        let result = match entity {
            NewEntity::Species(s) => {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO species (scientific_name, taxonomy_id)
                    VALUES ($1, $2)
                    RETURNING id
                    "#,
                )
                .bind(&s.scientific_name)
                .bind(s.taxonomy_id)
                .fetch_one(&self.pool)
                .await
            },
            NewEntity::Genome(g) => {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO genomes (species_id, genome_build)
                    VALUES ($1, $2)
                    RETURNING id
                    "#,
                )
                .bind(g.species_id)
                .bind(&g.genome_build)
                .fetch_one(&self.pool)
                .await
            },
            NewEntity::DataProvider(p) => {
                sqlx::query_scalar::<_, i64>(
                    "INSERT INTO data_providers (name) VALUES ($1) RETURNING id",
                )
                .bind(&p.name)
                .fetch_one(&self.pool)
                .await
            },
            NewEntity::User(u) => {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO users (email, full_name, role)
                    VALUES ($1, $2, $3)
                    RETURNING id
                    "#,
                )
                .bind(&u.email)
                .bind(&u.full_name)
                .bind(&u.role)
                .fetch_one(&self.pool)
                .await
            },
            NewEntity::Recipe(r) => {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO recipes (name, package_name, preparer_class)
                    VALUES ($1, $2, $3)
                    RETURNING id
                    "#,
                )
                .bind(&r.name)
                .bind(&r.package_name)
                .bind(&r.preparer_class)
                .fetch_one(&self.pool)
                .await
            },
            NewEntity::StorageLocation(s) => {
                sqlx::query_scalar::<_, i64>(
                    r#"
                    INSERT INTO storage_locations (name, location_type, base_url)
                    VALUES ($1, $2, $3)
                    RETURNING id
                    "#,
                )
                .bind(&s.name)
                .bind(s.location_type.as_str())
                .bind(&s.base_url)
                .fetch_one(&self.pool)
                .await
            },
            NewEntity::Tag(t) => {
                sqlx::query_scalar::<_, i64>("INSERT INTO tags (tag) VALUES ($1) RETURNING id")
                    .bind(&t.tag)
                    .fetch_one(&self.pool)
                    .await
            },
        };

        result.map_err(|e| {
            let key = entity.key();
            DbError::from_insert(e, key.kind().as_str(), &key.to_string())
        })
    }

    async fn resource_index(&self, hub_id: Id) -> DbResult<HashMap<String, Id>> {
        let rows = sqlx::query_as::<_, (String, i64)>(
            r#"
            SELECT DISTINCT ON (hub_accession) hub_accession, id
            FROM resources
            WHERE hub_id = $1
            ORDER BY hub_accession, version_number DESC
            "#,
        )
        .bind(hub_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().collect())
    }

    async fn insert_resources(&self, batch: &[NewResource]) -> DbResult<Vec<(String, Id)>> {
        let mut inserted = Vec::with_capacity(batch.len());

        for chunk in batch.chunks(rows_per_statement(16)) {
            let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
                r#"
                INSERT INTO resources (
                    hub_id, hub_accession, title, description, species_id, genome_id,
                    coordinate_1_based, data_provider_id, recipe_id, maintainer_id, status_id,
                    created_at, valid_from, valid_to, version_number, deleted_at
                )
                "#,
            );

            query_builder.push_values(chunk, |mut b, r| {
                b.push_bind(r.hub_id)
                    .push_bind(&r.hub_accession)
                    .push_bind(&r.title)
                    .push_bind(&r.description)
                    .push_bind(r.species_id)
                    .push_bind(r.genome_id)
                    .push_bind(r.coordinate_1_based)
                    .push_bind(r.data_provider_id)
                    .push_bind(r.recipe_id)
                    .push_bind(r.maintainer_id)
                    .push_bind(r.status_id)
                    .push_bind(r.created_at)
                    .push_bind(r.valid_from)
                    .push_bind(r.valid_to)
                    .push_bind(r.version_number)
                    .push_bind(r.deleted_at);
            });
            query_builder.push(" RETURNING hub_accession, id");

            let rows = query_builder
                .build_query_as::<(String, i64)>()
                .fetch_all(&self.pool)
                .await
                .map_err(|e| {
                    let first = chunk.first().map(|r| r.hub_accession.as_str()).unwrap_or("");
                    DbError::from_insert(e, "resource batch starting at", first)
                })?;

            debug!(rows = rows.len(), "Inserted resource batch");
            inserted.extend(rows);
        }

        Ok(inserted)
    }

    async fn insert_resource_tags(&self, links: &[ResourceTagLink]) -> DbResult<u64> {
        let mut inserted = 0;
        for chunk in links.chunks(rows_per_statement(2)) {
            let mut query_builder: QueryBuilder<Postgres> =
                QueryBuilder::new("INSERT INTO resource_tags (resource_id, tag_id) ");
            query_builder.push_values(chunk, |mut b, link| {
                b.push_bind(link.resource_id).push_bind(link.tag_id);
            });
            query_builder.push(" ON CONFLICT (resource_id, tag_id) DO NOTHING");

            let result = query_builder.build().execute(&self.pool).await?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }

    async fn insert_resource_bioc_versions(&self, links: &[ResourceBiocLink]) -> DbResult<u64> {
        let mut inserted = 0;
        for chunk in links.chunks(rows_per_statement(2)) {
            let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
                "INSERT INTO resource_bioc_versions (resource_id, bioc_release_id) ",
            );
            query_builder.push_values(chunk, |mut b, link| {
                b.push_bind(link.resource_id).push_bind(link.bioc_release_id);
            });
            query_builder.push(" ON CONFLICT (resource_id, bioc_release_id) DO NOTHING");

            let result = query_builder.build().execute(&self.pool).await?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }

    async fn insert_resource_files(&self, files: &[NewResourceFile]) -> DbResult<u64> {
        let mut inserted = 0;
        for chunk in files.chunks(rows_per_statement(6)) {
            let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
                r#"
                INSERT INTO resource_files (
                    resource_id, storage_location_id, file_path, rdata_class, dispatch_class,
                    valid_from
                )
                "#,
            );
            query_builder.push_values(chunk, |mut b, f| {
                b.push_bind(f.resource_id)
                    .push_bind(f.storage_location_id)
                    .push_bind(&f.file_path)
                    .push_bind(&f.rdata_class)
                    .push_bind(&f.dispatch_class)
                    .push_bind(f.valid_from);
            });
            query_builder
                .push(" ON CONFLICT (resource_id, file_path) WHERE valid_to IS NULL DO NOTHING");

            let result = query_builder.build().execute(&self.pool).await?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }

    async fn insert_source_files(&self, files: &[NewSourceFile]) -> DbResult<u64> {
        let mut inserted = 0;
        for chunk in files.chunks(rows_per_statement(8)) {
            let mut query_builder: QueryBuilder<Postgres> = QueryBuilder::new(
                r#"
                INSERT INTO source_files (
                    resource_id, source_url, source_type, source_version, md5_hash,
                    file_size_bytes, last_modified_date, valid_from
                )
                "#,
            );
            query_builder.push_values(chunk, |mut b, f| {
                b.push_bind(f.resource_id)
                    .push_bind(&f.source_url)
                    .push_bind(&f.source_type)
                    .push_bind(&f.source_version)
                    .push_bind(&f.md5_hash)
                    .push_bind(f.file_size_bytes)
                    .push_bind(f.last_modified_date)
                    .push_bind(f.valid_from);
            });
            query_builder
                .push(" ON CONFLICT (resource_id, source_url) WHERE valid_to IS NULL DO NOTHING");

            let result = query_builder.build().execute(&self.pool).await?;
            inserted += result.rows_affected();
        }
        Ok(inserted)
    }

    async fn table_counts(&self) -> DbResult<Vec<TableCount>> {
        schema::table_counts(&self.pool).await
    }
}
