use serde::Deserialize;
use utoipa::ToSchema;

use crate::models::OrderStatus;

/// Query-string values arrive as strings, and `serde(flatten)` buffers them
/// as strings even when the target field is numeric. Accept both forms.
fn numeric_param<'de, D>(deserializer: D) -> Result<Option<i64>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Number(i64),
        Text(String),
    }

    match Option::<Raw>::deserialize(deserializer)? {
        None => Ok(None),
        Some(Raw::Number(n)) => Ok(Some(n)),
        Some(Raw::Text(s)) if s.is_empty() => Ok(None),
        Some(Raw::Text(s)) => s.parse().map(Some).map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct Pagination {
    #[serde(default, deserialize_with = "numeric_param")]
    pub page: Option<i64>,
    #[serde(default, deserialize_with = "numeric_param")]
    pub per_page: Option<i64>,
}

impl Pagination {
    pub fn normalize(&self) -> (i64, i64, i64) {
        let page = self.page.unwrap_or(1).max(1);
        let per_page = self.per_page.unwrap_or(20).clamp(1, 100);
        let offset = (page - 1) * per_page;
        (page, per_page, offset)
    }
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum SortOrder {
    Asc,
    Desc,
}

#[derive(Debug, Deserialize, ToSchema)]
#[serde(rename_all = "snake_case")]
pub enum ProductSortBy {
    CreatedAt,
    Price,
    Name,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct ProductQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub sort_by: Option<ProductSortBy>,
    pub sort_order: Option<SortOrder>,
}

#[derive(Debug, Deserialize, ToSchema)]
pub struct OrderListQuery {
    #[serde(flatten)]
    pub pagination: Pagination,
    pub status: Option<OrderStatus>,
    pub sort_order: Option<SortOrder>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pagination_defaults_and_clamps() {
        let p = Pagination {
            page: None,
            per_page: None,
        };
        assert_eq!(p.normalize(), (1, 20, 0));

        let p = Pagination {
            page: Some(0),
            per_page: Some(1000),
        };
        assert_eq!(p.normalize(), (1, 100, 0));

        let p = Pagination {
            page: Some(3),
            per_page: Some(10),
        };
        assert_eq!(p.normalize(), (3, 10, 20));
    }

    #[test]
    fn pagination_parses_from_a_query_string() {
        let p: Pagination = serde_urlencoded::from_str("page=2&per_page=10").unwrap();
        assert_eq!(p.normalize(), (2, 10, 10));

        let p: Pagination = serde_urlencoded::from_str("").unwrap();
        assert_eq!(p.normalize(), (1, 20, 0));
    }

    #[test]
    fn flattened_pagination_parses_alongside_other_params() {
        let q: ProductQuery =
            serde_urlencoded::from_str("page=2&per_page=10&sort_by=price&sort_order=asc").unwrap();
        assert_eq!(q.pagination.normalize(), (2, 10, 10));
        assert!(matches!(q.sort_by, Some(ProductSortBy::Price)));

        let q: OrderListQuery =
            serde_urlencoded::from_str("page=3&status=Not%20Processed").unwrap();
        assert_eq!(q.pagination.normalize(), (3, 20, 40));
        assert_eq!(q.status, Some(OrderStatus::NotProcessed));
    }

    #[test]
    fn non_numeric_page_is_rejected() {
        assert!(serde_urlencoded::from_str::<Pagination>("page=abc").is_err());
    }
}
