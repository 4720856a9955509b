//! Translation of list query strings into store queries.
//!
//! `?duration[gte]=5&difficulty=easy&sort=-price,name&fields=name,price&page=2&limit=10`
//! becomes a filtered, ordered and windowed `Select`, plus a projection that
//! is applied to the rendered documents.

use std::str::FromStr;

use chrono::{DateTime, FixedOffset, NaiveDate};
use sea_orm::{
    ColumnTrait, ColumnType, EntityTrait, Iterable, Order, PrimaryKeyToColumn, QueryFilter,
    QueryOrder, QuerySelect, Select, Value,
};
use serde_json::Value as Json;
use uuid::Uuid;

use crate::error::{AppError, AppResult};

pub const DEFAULT_PAGE: u64 = 1;
pub const DEFAULT_LIMIT: u64 = 100;

/// Offsets and limits are bound as signed 64-bit integers.
const MAX_WINDOW: u64 = i64::MAX as u64;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Comparison {
    Eq,
    Gt,
    Gte,
    Lt,
    Lte,
}

impl Comparison {
    fn parse(op: &str) -> AppResult<Self> {
        match op {
            "gt" => Ok(Comparison::Gt),
            "gte" => Ok(Comparison::Gte),
            "lt" => Ok(Comparison::Lt),
            "lte" => Ok(Comparison::Lte),
            other => Err(AppError::BadRequest(format!(
                "Unsupported filter operator: {}",
                other
            ))),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct FieldFilter {
    pub field: String,
    pub op: Comparison,
    pub value: String,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SortKey {
    pub field: String,
    pub descending: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum Projection {
    #[default]
    All,
    Include(Vec<String>),
    Exclude(Vec<String>),
}

#[derive(Debug, Clone, PartialEq)]
pub struct QueryFeatures {
    pub filters: Vec<FieldFilter>,
    pub sort: Vec<SortKey>,
    pub projection: Projection,
    pub page: u64,
    pub limit: u64,
}

impl Default for QueryFeatures {
    fn default() -> Self {
        Self {
            filters: Vec::new(),
            sort: Vec::new(),
            projection: Projection::All,
            page: DEFAULT_PAGE,
            limit: DEFAULT_LIMIT,
        }
    }
}

impl QueryFeatures {
    /// Reserved keys keep their last occurrence; every other key is a filter.
    pub fn parse(params: &[(String, String)]) -> AppResult<Self> {
        let mut features = Self::default();

        for (key, value) in params {
            match key.as_str() {
                "page" => features.page = positive_or(value, DEFAULT_PAGE),
                "limit" => features.limit = positive_or(value, DEFAULT_LIMIT),
                "sort" => features.sort = parse_sort(value),
                "fields" => features.projection = parse_projection(value)?,
                _ => features.filters.push(parse_filter(key, value)?),
            }
        }

        features.check_window()?;
        Ok(features)
    }

    fn check_window(&self) -> AppResult<()> {
        let fits = self.limit <= MAX_WINDOW
            && (self.page - 1)
                .checked_mul(self.limit)
                .is_some_and(|offset| offset <= MAX_WINDOW);

        if fits {
            Ok(())
        } else {
            Err(AppError::BadRequest("The requested page is out of range".to_string()))
        }
    }

    pub fn offset(&self) -> u64 {
        (self.page - 1).saturating_mul(self.limit)
    }

    /// Add filters, ordering and the pagination window to `select`.
    pub fn apply<E: EntityTrait>(&self, select: Select<E>) -> AppResult<Select<E>> {
        let mut select = select;

        for filter in &self.filters {
            let column = resolve_column::<E>(&filter.field)?;
            let value = coerce(&column, &filter.value)?;
            select = select.filter(match filter.op {
                Comparison::Eq => column.eq(value),
                Comparison::Gt => column.gt(value),
                Comparison::Gte => column.gte(value),
                Comparison::Lt => column.lt(value),
                Comparison::Lte => column.lte(value),
            });
        }

        if self.sort.is_empty() {
            if let Ok(created_at) = E::Column::from_str("created_at") {
                select = select.order_by(created_at, Order::Desc);
            }
        } else {
            for key in &self.sort {
                let column = resolve_column::<E>(&key.field)?;
                let order = if key.descending { Order::Desc } else { Order::Asc };
                select = select.order_by(column, order);
            }
        }

        // Stable windows across pages.
        for key in E::PrimaryKey::iter() {
            select = select.order_by(key.into_column(), Order::Asc);
        }

        Ok(select.offset(self.offset()).limit(self.limit))
    }

    /// Apply the `fields` projection to a rendered document. `id` is always kept.
    pub fn project(&self, doc: Json) -> Json {
        match (&self.projection, doc) {
            (Projection::Include(fields), Json::Object(map)) => Json::Object(
                map.into_iter()
                    .filter(|(key, _)| key == "id" || fields.iter().any(|f| f == key))
                    .collect(),
            ),
            (Projection::Exclude(fields), Json::Object(mut map)) => {
                for field in fields {
                    map.remove(field);
                }
                Json::Object(map)
            }
            (_, doc) => doc,
        }
    }
}

fn positive_or(raw: &str, default: u64) -> u64 {
    match raw.trim().parse::<u64>() {
        Ok(0) | Err(_) => default,
        Ok(value) => value,
    }
}

fn parse_sort(raw: &str) -> Vec<SortKey> {
    raw.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| match part.strip_prefix('-') {
            Some(field) => SortKey {
                field: field.to_string(),
                descending: true,
            },
            None => SortKey {
                field: part.to_string(),
                descending: false,
            },
        })
        .collect()
}

fn parse_projection(raw: &str) -> AppResult<Projection> {
    let parts: Vec<&str> = raw
        .split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .collect();

    if parts.is_empty() {
        return Ok(Projection::All);
    }

    let excluded = parts.iter().filter(|part| part.starts_with('-')).count();
    if excluded == parts.len() {
        Ok(Projection::Exclude(
            parts.iter().map(|part| to_camel_case(&part[1..])).collect(),
        ))
    } else if excluded == 0 {
        Ok(Projection::Include(
            parts.iter().map(|part| to_camel_case(part)).collect(),
        ))
    } else {
        Err(AppError::BadRequest(
            "Field selection cannot mix included and excluded fields".to_string(),
        ))
    }
}

fn parse_filter(key: &str, value: &str) -> AppResult<FieldFilter> {
    let (field, op) = match key.split_once('[') {
        Some((field, rest)) => {
            let op = rest.strip_suffix(']').ok_or_else(|| {
                AppError::BadRequest(format!("Malformed filter parameter: {}", key))
            })?;
            (field, Comparison::parse(op)?)
        }
        None => (key, Comparison::Eq),
    };

    Ok(FieldFilter {
        field: field.to_string(),
        op,
        value: value.to_string(),
    })
}

/// Accepts snake_case or camelCase names, and reference names without their
/// `_id` suffix (`tour` for `tour_id`).
fn resolve_column<E: EntityTrait>(field: &str) -> AppResult<E::Column> {
    let snake = to_snake_case(field);
    E::Column::from_str(field)
        .or_else(|_| E::Column::from_str(&snake))
        .or_else(|_| E::Column::from_str(&format!("{}_id", snake)))
        .map_err(|_| AppError::BadRequest(format!("Invalid field name: {}", field)))
}

fn coerce<C: ColumnTrait>(column: &C, raw: &str) -> AppResult<Value> {
    let invalid = || {
        AppError::BadRequest(format!(
            "Invalid value '{}' for field {}",
            raw,
            column.as_str()
        ))
    };

    let value = match column.def().get_column_type() {
        ColumnType::TinyInteger | ColumnType::SmallInteger | ColumnType::Integer => {
            raw.parse::<i32>().map_err(|_| invalid())?.into()
        }
        ColumnType::BigInteger => raw.parse::<i64>().map_err(|_| invalid())?.into(),
        ColumnType::Float | ColumnType::Double | ColumnType::Decimal(_) => {
            raw.parse::<f64>().map_err(|_| invalid())?.into()
        }
        ColumnType::Boolean => raw.parse::<bool>().map_err(|_| invalid())?.into(),
        ColumnType::Uuid => Uuid::parse_str(raw).map_err(|_| invalid())?.into(),
        ColumnType::Timestamp
        | ColumnType::TimestampWithTimeZone
        | ColumnType::DateTime
        | ColumnType::Date => parse_instant(raw).ok_or_else(invalid)?.into(),
        _ => raw.to_string().into(),
    };

    Ok(value)
}

fn parse_instant(raw: &str) -> Option<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(raw).ok().or_else(|| {
        NaiveDate::parse_from_str(raw, "%Y-%m-%d")
            .ok()
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc().fixed_offset())
    })
}

fn to_snake_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len() + 4);
    for ch in field.chars() {
        if ch.is_ascii_uppercase() {
            out.push('_');
            out.push(ch.to_ascii_lowercase());
        } else {
            out.push(ch);
        }
    }
    out
}

fn to_camel_case(field: &str) -> String {
    let mut out = String::with_capacity(field.len());
    let mut upper_next = false;
    for ch in field.chars() {
        if ch == '_' {
            upper_next = true;
        } else if upper_next {
            out.push(ch.to_ascii_uppercase());
            upper_next = false;
        } else {
            out.push(ch);
        }
    }
    out
}
