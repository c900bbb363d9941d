use sqlx::{FromRow, PgPool, Postgres, Transaction};
use uuid::Uuid;

use crate::{
    error::ApiError,
    models::menu::{
        decode_allergens, encode_allergens, MenuEntry, MenuEntryWithVariant, MenuType,
        MenuVariant, NewMenu, UpdateMenuRequest, WeeklyGrid,
    },
};

const ENTRY_COLUMNS: &str = "m.id, m.name, m.description, m.number_of_people, m.menu_type, \
     m.day_of_week, m.meal_type, m.created_at, m.updated_at";

/// One left-joined row across the base table and all three variant tables.
/// Which extension columns are meaningful is decided by `menu_type`.
#[derive(Debug, FromRow)]
struct MenuVariantRow {
    #[sqlx(flatten)]
    entry: MenuEntry,
    has_normal: bool,
    age_range: Option<String>,
    allergens: Option<String>,
}

impl From<MenuVariantRow> for MenuEntryWithVariant {
    fn from(row: MenuVariantRow) -> Self {
        let variant = match row.entry.menu_type {
            MenuType::Normal => row.has_normal.then_some(MenuVariant::Normal),
            MenuType::Kids => row.age_range.map(|age_range| MenuVariant::Kids { age_range }),
            MenuType::Allergy => row.allergens.map(|raw| MenuVariant::Allergy {
                allergens: decode_allergens(&raw),
            }),
        };
        Self {
            entry: row.entry,
            variant,
        }
    }
}

pub struct MenuService;

impl MenuService {
    /// All menu entries with their variant attached (left-join semantics:
    /// an entry still appears when its variant row is missing).
    pub async fn list(pool: &PgPool) -> Result<Vec<MenuEntryWithVariant>, ApiError> {
        let rows = sqlx::query_as::<_, MenuVariantRow>(&format!(
            "SELECT {ENTRY_COLUMNS},
                    (n.menu_id IS NOT NULL) AS has_normal, k.age_range, a.allergens
             FROM menus m
             LEFT JOIN normal_menus n ON n.menu_id = m.id
             LEFT JOIN kids_menus k ON k.menu_id = m.id
             LEFT JOIN allergy_menus a ON a.menu_id = m.id
             ORDER BY m.created_at, m.id"
        ))
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    pub async fn get(pool: &PgPool, id: Uuid) -> Result<MenuEntryWithVariant, ApiError> {
        let row = sqlx::query_as::<_, MenuVariantRow>(&format!(
            "SELECT {ENTRY_COLUMNS},
                    (n.menu_id IS NOT NULL) AS has_normal, k.age_range, a.allergens
             FROM menus m
             LEFT JOIN normal_menus n ON n.menu_id = m.id
             LEFT JOIN kids_menus k ON k.menu_id = m.id
             LEFT JOIN allergy_menus a ON a.menu_id = m.id
             WHERE m.id = $1"
        ))
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Menu not found".into()))?;
        Ok(row.into())
    }

    /// Entries of one variant kind, inner-joined from the variant table so
    /// that variant rows without a base record are excluded.
    pub async fn list_by_type(
        pool: &PgPool,
        menu_type: MenuType,
    ) -> Result<Vec<MenuEntryWithVariant>, ApiError> {
        let sql = match menu_type {
            MenuType::Normal => format!(
                "SELECT {ENTRY_COLUMNS}, TRUE AS has_normal,
                        NULL::TEXT AS age_range, NULL::TEXT AS allergens
                 FROM normal_menus n
                 JOIN menus m ON m.id = n.menu_id
                 ORDER BY m.created_at, m.id"
            ),
            MenuType::Kids => format!(
                "SELECT {ENTRY_COLUMNS}, FALSE AS has_normal,
                        k.age_range, NULL::TEXT AS allergens
                 FROM kids_menus k
                 JOIN menus m ON m.id = k.menu_id
                 ORDER BY m.created_at, m.id"
            ),
            MenuType::Allergy => format!(
                "SELECT {ENTRY_COLUMNS}, FALSE AS has_normal,
                        NULL::TEXT AS age_range, a.allergens
                 FROM allergy_menus a
                 JOIN menus m ON m.id = a.menu_id
                 ORDER BY m.created_at, m.id"
            ),
        };
        let rows = sqlx::query_as::<_, MenuVariantRow>(&sql)
            .fetch_all(pool)
            .await?;
        Ok(rows.into_iter().map(Into::into).collect())
    }

    /// Create the base entry and its variant row in one transaction. A
    /// failed variant insert rolls the base insert back and surfaces as a
    /// Consistency error, so no orphaned base record can persist.
    pub async fn create_with_variant(
        pool: &PgPool,
        new: NewMenu,
    ) -> Result<(MenuEntry, MenuVariant), ApiError> {
        let mut tx = pool.begin().await?;

        let entry = sqlx::query_as::<_, MenuEntry>(
            "INSERT INTO menus
                 (id, name, description, number_of_people, menu_type, day_of_week, meal_type)
             VALUES ($1, $2, $3, $4, $5, $6, $7)
             RETURNING *",
        )
        .bind(Uuid::new_v4())
        .bind(&new.name)
        .bind(&new.description)
        .bind(new.number_of_people)
        .bind(new.menu_type)
        .bind(new.day_of_week.as_str())
        .bind(new.meal_type.as_str())
        .fetch_one(&mut *tx)
        .await?;

        if let Err(e) = Self::insert_variant(&mut tx, entry.id, &new.variant).await {
            tx.rollback().await.ok();
            return Err(ApiError::Consistency(e.to_string()));
        }

        tx.commit().await?;
        Ok((entry, new.variant))
    }

    async fn insert_variant(
        tx: &mut Transaction<'_, Postgres>,
        menu_id: Uuid,
        variant: &MenuVariant,
    ) -> Result<(), sqlx::Error> {
        match variant {
            MenuVariant::Normal => {
                sqlx::query("INSERT INTO normal_menus (menu_id) VALUES ($1)")
                    .bind(menu_id)
                    .execute(&mut **tx)
                    .await?;
            }
            MenuVariant::Kids { age_range } => {
                sqlx::query("INSERT INTO kids_menus (menu_id, age_range) VALUES ($1, $2)")
                    .bind(menu_id)
                    .bind(age_range)
                    .execute(&mut **tx)
                    .await?;
            }
            MenuVariant::Allergy { allergens } => {
                sqlx::query("INSERT INTO allergy_menus (menu_id, allergens) VALUES ($1, $2)")
                    .bind(menu_id)
                    .bind(encode_allergens(allergens))
                    .execute(&mut **tx)
                    .await?;
            }
        }
        Ok(())
    }

    /// Partial update of base scalar fields; the menu type and variant row
    /// are never touched here.
    pub async fn update(
        pool: &PgPool,
        id: Uuid,
        req: &UpdateMenuRequest,
    ) -> Result<MenuEntry, ApiError> {
        req.validate()?;
        let entry = sqlx::query_as::<_, MenuEntry>(
            "UPDATE menus
             SET name             = COALESCE($1, name),
                 description      = COALESCE($2, description),
                 number_of_people = COALESCE($3, number_of_people),
                 day_of_week      = COALESCE($4, day_of_week),
                 meal_type        = COALESCE($5, meal_type),
                 updated_at       = NOW()
             WHERE id = $6
             RETURNING *",
        )
        .bind(&req.name)
        .bind(&req.description)
        .bind(req.number_of_people)
        .bind(&req.day_of_week)
        .bind(&req.meal_type)
        .bind(id)
        .fetch_optional(pool)
        .await?
        .ok_or_else(|| ApiError::NotFound("Menu not found".into()))?;
        Ok(entry)
    }

    /// Delete the base entry; the variant row goes with it via the cascade
    /// on the foreign key.
    pub async fn delete(pool: &PgPool, id: Uuid) -> Result<(), ApiError> {
        let result = sqlx::query("DELETE FROM menus WHERE id = $1")
            .bind(id)
            .execute(pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(ApiError::NotFound("Menu not found".into()));
        }
        Ok(())
    }

    /// Recompute the 7x3 weekly grid from the full collection. No caching;
    /// the collection is a single household's plan and stays small.
    pub async fn weekly(pool: &PgPool) -> Result<WeeklyGrid, ApiError> {
        let entries = Self::list(pool).await?;
        Ok(WeeklyGrid::build(entries))
    }
}
