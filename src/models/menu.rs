use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use uuid::Uuid;

use crate::error::ApiError;

/// The three mutually-exclusive menu specializations. Stored as the Postgres
/// enum type `menu_type`; immutable after creation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "menu_type", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MenuType {
    Normal,
    Kids,
    Allergy,
}

impl MenuType {
    /// Case-insensitive parse used for dispatch on caller-supplied type tags.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "normal" => Some(Self::Normal),
            "kids" => Some(Self::Kids),
            "allergy" => Some(Self::Allergy),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DayOfWeek {
    Monday,
    Tuesday,
    Wednesday,
    Thursday,
    Friday,
    Saturday,
    Sunday,
}

impl DayOfWeek {
    pub const ALL: [DayOfWeek; 7] = [
        Self::Monday,
        Self::Tuesday,
        Self::Wednesday,
        Self::Thursday,
        Self::Friday,
        Self::Saturday,
        Self::Sunday,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Monday => "monday",
            Self::Tuesday => "tuesday",
            Self::Wednesday => "wednesday",
            Self::Thursday => "thursday",
            Self::Friday => "friday",
            Self::Saturday => "saturday",
            Self::Sunday => "sunday",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|d| d.as_str() == s)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MealType {
    Breakfast,
    Lunch,
    Dinner,
}

impl MealType {
    pub const ALL: [MealType; 3] = [Self::Breakfast, Self::Lunch, Self::Dinner];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Breakfast => "breakfast",
            Self::Lunch => "lunch",
            Self::Dinner => "dinner",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|m| m.as_str() == s)
    }
}

/// One planned meal occurrence. `day_of_week` and `meal_type` are stored as
/// validated lowercase text; the weekly grid re-checks membership and drops
/// anything outside the 21 fixed buckets rather than failing the aggregation.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
#[serde(rename_all = "camelCase")]
pub struct MenuEntry {
    pub id: Uuid,
    pub name: String,
    pub description: String,
    pub number_of_people: i32,
    pub menu_type: MenuType,
    pub day_of_week: String,
    pub meal_type: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Variant extension attached 1:1 to a menu entry, tagged union over the
/// three per-type tables.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "menuType", rename_all = "lowercase", rename_all_fields = "camelCase")]
pub enum MenuVariant {
    Normal,
    Kids { age_range: String },
    Allergy { allergens: Vec<String> },
}

/// A menu entry with its variant row attached, when one exists.
#[derive(Debug, Clone, Serialize)]
pub struct MenuEntryWithVariant {
    #[serde(flatten)]
    pub entry: MenuEntry,
    pub variant: Option<MenuVariant>,
}

/// Allergen tags are persisted as one comma-joined text column. The pair
/// below round-trips any sequence whose elements contain no comma.
pub fn encode_allergens(allergens: &[String]) -> String {
    allergens.join(",")
}

pub fn decode_allergens(raw: &str) -> Vec<String> {
    if raw.is_empty() {
        return Vec::new();
    }
    raw.split(',').map(str::to_string).collect()
}

/// Body for POST /api/menu. Every field is optional at the serde level so
/// that validation can name the missing field instead of failing on decode.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateMenuRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub number_of_people: Option<i32>,
    pub menu_type: Option<String>,
    pub day_of_week: Option<String>,
    pub meal_type: Option<String>,
    // variant-specific fields
    pub age_range: Option<String>,
    pub allergens: Option<Vec<String>>,
}

/// A fully validated create request, ready for the two-insert transaction.
#[derive(Debug, Clone)]
pub struct NewMenu {
    pub name: String,
    pub description: String,
    pub number_of_people: i32,
    pub menu_type: MenuType,
    pub day_of_week: DayOfWeek,
    pub meal_type: MealType,
    pub variant: MenuVariant,
}

pub const DEFAULT_KIDS_AGE_RANGE: &str = "3-12";

impl CreateMenuRequest {
    /// Validate base fields and resolve the variant for the declared type,
    /// applying per-type defaults. Nothing is written before this succeeds.
    pub fn validate(self) -> Result<NewMenu, ApiError> {
        let name = self
            .name
            .filter(|n| !n.trim().is_empty())
            .ok_or_else(|| ApiError::Validation("name must be a non-empty string".into()))?;
        let description = self
            .description
            .ok_or_else(|| ApiError::Validation("description is required".into()))?;
        let number_of_people = self.number_of_people.unwrap_or(1);
        if number_of_people < 1 {
            return Err(ApiError::Validation(
                "numberOfPeople must be a positive integer".into(),
            ));
        }
        let day_of_week = self
            .day_of_week
            .as_deref()
            .and_then(DayOfWeek::parse)
            .ok_or_else(|| {
                ApiError::Validation("dayOfWeek must be one of monday through sunday".into())
            })?;
        let meal_type = self
            .meal_type
            .as_deref()
            .and_then(MealType::parse)
            .ok_or_else(|| {
                ApiError::Validation(
                    "mealType must be one of breakfast, lunch or dinner".into(),
                )
            })?;
        let menu_type = self
            .menu_type
            .as_deref()
            .and_then(MenuType::parse)
            .ok_or_else(|| ApiError::Validation("Invalid menu type".into()))?;

        let variant = match menu_type {
            MenuType::Normal => MenuVariant::Normal,
            MenuType::Kids => MenuVariant::Kids {
                age_range: self
                    .age_range
                    .unwrap_or_else(|| DEFAULT_KIDS_AGE_RANGE.to_string()),
            },
            MenuType::Allergy => MenuVariant::Allergy {
                allergens: self.allergens.unwrap_or_default(),
            },
        };

        Ok(NewMenu {
            name,
            description,
            number_of_people,
            menu_type,
            day_of_week,
            meal_type,
            variant,
        })
    }
}

/// Body for PUT /api/menu/{id}; unspecified fields are left unchanged.
/// The menu type and variant row are immutable after creation.
#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateMenuRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub number_of_people: Option<i32>,
    pub day_of_week: Option<String>,
    pub meal_type: Option<String>,
}

impl UpdateMenuRequest {
    pub fn validate(&self) -> Result<(), ApiError> {
        if let Some(name) = &self.name {
            if name.trim().is_empty() {
                return Err(ApiError::Validation("name must be a non-empty string".into()));
            }
        }
        if let Some(n) = self.number_of_people {
            if n < 1 {
                return Err(ApiError::Validation(
                    "numberOfPeople must be a positive integer".into(),
                ));
            }
        }
        if let Some(day) = &self.day_of_week {
            if DayOfWeek::parse(day).is_none() {
                return Err(ApiError::Validation(
                    "dayOfWeek must be one of monday through sunday".into(),
                ));
            }
        }
        if let Some(meal) = &self.meal_type {
            if MealType::parse(meal).is_none() {
                return Err(ApiError::Validation(
                    "mealType must be one of breakfast, lunch or dinner".into(),
                ));
            }
        }
        Ok(())
    }
}

/// The three meal slots of a single day, in display order.
#[derive(Debug, Default, Serialize)]
pub struct MealSlots {
    pub breakfast: Vec<MenuEntryWithVariant>,
    pub lunch: Vec<MenuEntryWithVariant>,
    pub dinner: Vec<MenuEntryWithVariant>,
}

impl MealSlots {
    fn slot_mut(&mut self, meal: MealType) -> &mut Vec<MenuEntryWithVariant> {
        match meal {
            MealType::Breakfast => &mut self.breakfast,
            MealType::Lunch => &mut self.lunch,
            MealType::Dinner => &mut self.dinner,
        }
    }
}

/// The fixed 7-day by 3-meal aggregation of all menu entries. Derived on
/// every request, never persisted or cached.
#[derive(Debug, Default, Serialize)]
pub struct WeeklyGrid {
    pub monday: MealSlots,
    pub tuesday: MealSlots,
    pub wednesday: MealSlots,
    pub thursday: MealSlots,
    pub friday: MealSlots,
    pub saturday: MealSlots,
    pub sunday: MealSlots,
}

impl WeeklyGrid {
    /// Bucket entries into the grid, preserving the input order within each
    /// slot. Entries outside the 21 fixed buckets are dropped silently.
    pub fn build(entries: Vec<MenuEntryWithVariant>) -> Self {
        let mut grid = Self::default();
        for entry in entries {
            let day = match DayOfWeek::parse(&entry.entry.day_of_week) {
                Some(d) => d,
                None => continue,
            };
            let meal = match MealType::parse(&entry.entry.meal_type) {
                Some(m) => m,
                None => continue,
            };
            grid.day_mut(day).slot_mut(meal).push(entry);
        }
        grid
    }

    fn day_mut(&mut self, day: DayOfWeek) -> &mut MealSlots {
        match day {
            DayOfWeek::Monday => &mut self.monday,
            DayOfWeek::Tuesday => &mut self.tuesday,
            DayOfWeek::Wednesday => &mut self.wednesday,
            DayOfWeek::Thursday => &mut self.thursday,
            DayOfWeek::Friday => &mut self.friday,
            DayOfWeek::Saturday => &mut self.saturday,
            DayOfWeek::Sunday => &mut self.sunday,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(day: &str, meal: &str, name: &str) -> MenuEntryWithVariant {
        MenuEntryWithVariant {
            entry: MenuEntry {
                id: Uuid::new_v4(),
                name: name.to_string(),
                description: "test dish".to_string(),
                number_of_people: 2,
                menu_type: MenuType::Normal,
                day_of_week: day.to_string(),
                meal_type: meal.to_string(),
                created_at: Utc::now(),
                updated_at: Utc::now(),
            },
            variant: Some(MenuVariant::Normal),
        }
    }

    fn create_request(menu_type: &str) -> CreateMenuRequest {
        CreateMenuRequest {
            name: Some("Pasta".into()),
            description: Some("Tomato pasta".into()),
            menu_type: Some(menu_type.into()),
            day_of_week: Some("monday".into()),
            meal_type: Some("dinner".into()),
            ..Default::default()
        }
    }

    #[test]
    fn allergen_encoding_round_trips() {
        let cases: [&[&str]; 4] = [
            &[],
            &["nuts"],
            &["nuts", "gluten", "dairy"],
            &["nuts", "", "dairy"],
        ];
        for case in cases {
            let xs: Vec<String> = case.iter().map(|s| s.to_string()).collect();
            assert_eq!(decode_allergens(&encode_allergens(&xs)), xs);
        }
    }

    #[test]
    fn empty_grid_has_all_21_buckets() {
        let grid = WeeklyGrid::build(Vec::new());
        let json = serde_json::to_value(&grid).unwrap();
        let days = json.as_object().unwrap();
        assert_eq!(days.len(), 7);
        for day in DayOfWeek::ALL {
            let slots = days[day.as_str()].as_object().unwrap();
            assert_eq!(slots.len(), 3);
            for meal in MealType::ALL {
                assert_eq!(slots[meal.as_str()], serde_json::json!([]));
            }
        }
    }

    #[test]
    fn grid_buckets_entries_and_preserves_order() {
        let grid = WeeklyGrid::build(vec![
            entry("monday", "lunch", "first"),
            entry("sunday", "dinner", "roast"),
            entry("monday", "lunch", "second"),
        ]);
        let names: Vec<&str> = grid
            .monday
            .lunch
            .iter()
            .map(|e| e.entry.name.as_str())
            .collect();
        assert_eq!(names, ["first", "second"]);
        assert_eq!(grid.sunday.dinner.len(), 1);
        assert!(grid.monday.breakfast.is_empty());
    }

    #[test]
    fn out_of_bucket_entries_are_dropped_silently() {
        let grid = WeeklyGrid::build(vec![
            entry("monday", "brunch", "dropped"),
            entry("someday", "lunch", "dropped too"),
            entry("monday", "breakfast", "kept"),
        ]);
        assert_eq!(grid.monday.breakfast.len(), 1);
        assert!(grid.monday.lunch.is_empty());
        let json = serde_json::to_value(&grid).unwrap();
        assert_eq!(json.as_object().unwrap().len(), 7);
    }

    #[test]
    fn create_validation_names_the_offending_field() {
        let missing_name = CreateMenuRequest {
            name: Some("   ".into()),
            ..create_request("normal")
        };
        let err = missing_name.validate().unwrap_err().to_string();
        assert!(err.contains("name"));

        let bad_people = CreateMenuRequest {
            number_of_people: Some(0),
            ..create_request("normal")
        };
        let err = bad_people.validate().unwrap_err().to_string();
        assert!(err.contains("numberOfPeople"));

        let bad_day = CreateMenuRequest {
            day_of_week: Some("funday".into()),
            ..create_request("normal")
        };
        let err = bad_day.validate().unwrap_err().to_string();
        assert!(err.contains("dayOfWeek"));
    }

    #[test]
    fn kids_variant_defaults_age_range() {
        let new = create_request("kids").validate().unwrap();
        assert_eq!(
            new.variant,
            MenuVariant::Kids {
                age_range: "3-12".into()
            }
        );
    }

    #[test]
    fn allergy_variant_defaults_to_empty_allergens() {
        let new = create_request("allergy").validate().unwrap();
        assert_eq!(new.variant, MenuVariant::Allergy { allergens: vec![] });
    }

    #[test]
    fn menu_type_dispatch_is_case_insensitive() {
        let new = create_request("KIDS").validate().unwrap();
        assert_eq!(new.menu_type, MenuType::Kids);
    }

    #[test]
    fn unknown_menu_type_is_rejected() {
        let err = create_request("bogus").validate().unwrap_err();
        assert_eq!(err.to_string(), "Invalid menu type");
    }

    #[test]
    fn number_of_people_defaults_to_one() {
        let new = create_request("normal").validate().unwrap();
        assert_eq!(new.number_of_people, 1);
    }

    #[test]
    fn update_validation_rejects_bad_partial_fields() {
        let bad = UpdateMenuRequest {
            meal_type: Some("brunch".into()),
            ..Default::default()
        };
        assert!(bad.validate().is_err());

        let ok = UpdateMenuRequest {
            name: Some("Stew".into()),
            ..Default::default()
        };
        assert!(ok.validate().is_ok());
    }
}
