//! Pagination engine: offset math and keyset windows.
//!
//! Both modes append the record id to the sort, so ordering - and with it
//! every page boundary - is deterministic even when the sort field has
//! duplicate values. Sorting on the sort field alone is never sufficient
//! and is deliberately not expressible through this module.

use plaza_core::{
    AccessResult, CursorToken, Filter, Record, ScalarValue, SortOrder, ValidationFault,
};

use crate::config::AccessConfig;

/// Validate and clamp caller-supplied `(page, limit)` inputs.
///
/// `page` must be at least 1 and `limit` at least 1; a limit above the
/// configured maximum is clamped rather than rejected.
pub fn clamp_page_inputs(page: u32, limit: u32, config: &AccessConfig) -> AccessResult<(u32, u32)> {
    if page == 0 {
        return Err(ValidationFault::InvalidValue {
            field: "page",
            reason: "must be at least 1".to_string(),
        }
        .into());
    }
    if limit == 0 {
        return Err(ValidationFault::InvalidValue {
            field: "limit",
            reason: "must be at least 1".to_string(),
        }
        .into());
    }
    Ok((page, limit.min(config.max_page_size)))
}

/// Build the keyset window predicate for a decoded cursor.
///
/// Ascending: `sort > v OR (sort = v AND id > tie)`; both comparators are
/// inverted for descending order. The id leg is what makes rows sharing
/// the same sort value paginate without overlap or gaps.
pub fn window_filter(token: &CursorToken, id_field: &str) -> Filter {
    let sort_field = token.sort_field.clone();
    let sort_value = token.sort_value.clone();
    let tie = ScalarValue::Uuid(token.tie);

    let (beyond, tie_beyond): (Filter, Filter) = match token.order {
        SortOrder::Asc => (
            Filter::Gt {
                field: sort_field.clone(),
                value: sort_value.clone(),
            },
            Filter::Gt {
                field: id_field.to_string(),
                value: tie,
            },
        ),
        SortOrder::Desc => (
            Filter::Lt {
                field: sort_field.clone(),
                value: sort_value.clone(),
            },
            Filter::Lt {
                field: id_field.to_string(),
                value: tie,
            },
        ),
    };

    Filter::Or {
        filters: vec![
            beyond,
            Filter::And {
                filters: vec![
                    Filter::Eq {
                        field: sort_field,
                        value: sort_value,
                    },
                    tie_beyond,
                ],
            },
        ],
    }
}

/// Mint a cursor token anchored on one boundary row.
pub fn token_from_row<R: Record>(
    row: &R,
    sort_by: &str,
    order: SortOrder,
) -> AccessResult<CursorToken> {
    let sort_value = if sort_by == R::ID_FIELD {
        ScalarValue::Uuid(row.id())
    } else {
        let image = serde_json::to_value(row)
            .map_err(|e| plaza_core::AccessError::internal(format!("row image: {e}")))?;
        image
            .get(sort_by)
            .and_then(ScalarValue::from_json)
            .unwrap_or(ScalarValue::Null)
    };

    Ok(CursorToken {
        sort_field: sort_by.to_string(),
        order,
        sort_value,
        tie: row.id(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use plaza_core::new_record_id;

    #[test]
    fn test_clamp_rejects_zero_page() {
        let config = AccessConfig::new("article");
        assert!(clamp_page_inputs(0, 10, &config).is_err());
        assert!(clamp_page_inputs(1, 0, &config).is_err());
    }

    #[test]
    fn test_clamp_bounds_limit() {
        let config = AccessConfig::new("article").with_page_sizes(20, 50);
        assert_eq!(clamp_page_inputs(2, 500, &config).unwrap(), (2, 50));
        assert_eq!(clamp_page_inputs(2, 30, &config).unwrap(), (2, 30));
    }

    #[test]
    fn test_window_filter_desc_inverts_comparators() {
        let token = CursorToken {
            sort_field: "created_at".to_string(),
            order: SortOrder::Desc,
            sort_value: ScalarValue::Int(100),
            tie: new_record_id(),
        };
        let filter = window_filter(&token, "article_id");

        let Filter::Or { filters } = filter else {
            panic!("window must be an OR");
        };
        assert!(matches!(&filters[0], Filter::Lt { field, .. } if field == "created_at"));
        let Filter::And { filters: tie_leg } = &filters[1] else {
            panic!("tie leg must be an AND");
        };
        assert!(matches!(&tie_leg[0], Filter::Eq { field, .. } if field == "created_at"));
        assert!(matches!(&tie_leg[1], Filter::Lt { field, .. } if field == "article_id"));
    }

    #[test]
    fn test_window_filter_asc() {
        let token = CursorToken {
            sort_field: "title".to_string(),
            order: SortOrder::Asc,
            sort_value: ScalarValue::Text("m".to_string()),
            tie: new_record_id(),
        };
        let Filter::Or { filters } = window_filter(&token, "article_id") else {
            panic!("window must be an OR");
        };
        assert!(matches!(&filters[0], Filter::Gt { .. }));
    }
}
