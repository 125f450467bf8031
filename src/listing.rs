use std::collections::HashMap;
use std::str::FromStr;

use crate::types::pagination::{Pagination, extract_pagination};

use handle_errors::Error;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortMode {
    #[default]
    Newest,
    Votes,
    Unanswered,
    Trending,
}

impl FromStr for SortMode {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "newest" => Ok(SortMode::Newest),
            "votes" => Ok(SortMode::Votes),
            "unanswered" => Ok(SortMode::Unanswered),
            "trending" => Ok(SortMode::Trending),
            other => Err(Error::Validation(format!("Unknown sort mode: {}", other))),
        }
    }
}

/// 모든 정렬은 최신순(created_at, id)으로 동점을 가른다
const NEWEST: &str = "created_at DESC, id DESC";

/// 인기도: 추천 수 + 답변 수 + 조회수/10
pub const TRENDING_SCORE: &str = "(votes + answer_count + views / 10.0)";

impl SortMode {
    pub fn order_by(&self) -> String {
        match self {
            SortMode::Newest | SortMode::Unanswered => NEWEST.to_string(),
            SortMode::Votes => format!("votes DESC, {}", NEWEST),
            SortMode::Trending => format!("{} DESC, {}", TRENDING_SCORE, NEWEST),
        }
    }
}

// $1 검색 패턴, $2 태그 목록, $3 답변 없는 질문만
const FILTER: &str = "($1::TEXT IS NULL
        OR title ILIKE $1
        OR body ILIKE $1
        OR EXISTS (SELECT 1 FROM unnest(tags) AS tag WHERE tag ILIKE $1))
    AND (cardinality($2::TEXT[]) = 0 OR tags && $2::TEXT[])
    AND (NOT $3::BOOLEAN OR answer_count = 0)";

/// `needle`을 그대로 포함하는 값과 맞는 LIKE 패턴. `%`, `_`, `\`는 이스케이프한다.
pub fn contains_pattern(needle: &str) -> String {
    let mut pattern = String::with_capacity(needle.len() + 2);
    pattern.push('%');
    for c in needle.chars() {
        if matches!(c, '%' | '_' | '\\') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

#[derive(Debug, Clone, PartialEq)]
pub struct ListingQuery {
    pub search: Option<String>,
    pub tags: Vec<String>,
    pub sort: SortMode,
    pub pagination: Pagination,
}

impl ListingQuery {
    /// `search`, `tags`(쉼표 구분), `sort`, `page` 쿼리 매개변수를 읽는다.
    pub fn from_params(params: &HashMap<String, String>, per_page: u32) -> Result<Self, Error> {
        let search = params
            .get("search")
            .map(|s| s.trim().to_lowercase())
            .filter(|s| !s.is_empty());
        let tags = params
            .get("tags")
            .map(|tags| {
                tags.split(',')
                    .map(|t| t.trim().to_lowercase())
                    .filter(|t| !t.is_empty())
                    .collect()
            })
            .unwrap_or_default();
        let sort = match params.get("sort") {
            Some(sort) => sort.parse()?,
            None => SortMode::default(),
        };

        Ok(ListingQuery {
            search,
            tags,
            sort,
            pagination: extract_pagination(params, per_page)?,
        })
    }

    pub fn search_pattern(&self) -> Option<String> {
        self.search.as_deref().map(contains_pattern)
    }

    pub fn unanswered_only(&self) -> bool {
        self.sort == SortMode::Unanswered
    }

    /// 조건에 맞는 질문 수. $1..$3을 묶는다.
    pub fn count_sql(&self) -> String {
        format!("SELECT COUNT(*) AS total FROM questions WHERE {}", FILTER)
    }

    /// 현재 페이지의 질문. $1..$3 다음에 $4 LIMIT, $5 OFFSET을 묶는다.
    pub fn select_sql(&self) -> String {
        format!(
            "SELECT * FROM questions WHERE {} ORDER BY {} LIMIT $4 OFFSET $5",
            FILTER,
            self.sort.order_by()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn query(sort: SortMode) -> ListingQuery {
        ListingQuery {
            search: None,
            tags: Vec::new(),
            sort,
            pagination: Pagination::first(10),
        }
    }

    #[test]
    fn every_order_ends_with_newest_first() {
        for sort in [
            SortMode::Newest,
            SortMode::Votes,
            SortMode::Unanswered,
            SortMode::Trending,
        ] {
            assert!(sort.order_by().ends_with("created_at DESC, id DESC"));
        }
    }

    #[test]
    fn votes_and_trending_lead_with_their_score() {
        assert!(SortMode::Votes.order_by().starts_with("votes DESC"));
        assert_eq!(
            SortMode::Trending.order_by(),
            "(votes + answer_count + views / 10.0) DESC, created_at DESC, id DESC"
        );
    }

    #[test]
    fn unanswered_is_a_filter_not_an_order() {
        assert!(query(SortMode::Unanswered).unanswered_only());
        assert!(!query(SortMode::Newest).unanswered_only());
        assert_eq!(SortMode::Unanswered.order_by(), SortMode::Newest.order_by());
    }

    #[test]
    fn select_is_paged_in_sql() {
        let sql = query(SortMode::Votes).select_sql();
        assert!(sql.contains("tags && $2::TEXT[]"));
        assert!(sql.contains("answer_count = 0"));
        assert!(sql.contains("ORDER BY votes DESC"));
        assert!(sql.ends_with("LIMIT $4 OFFSET $5"));
        assert!(!query(SortMode::Votes).count_sql().contains("LIMIT"));
    }

    #[test]
    fn like_wildcards_are_escaped() {
        assert_eq!(contains_pattern("hooks"), "%hooks%");
        assert_eq!(contains_pattern("100%"), "%100\\%%");
        assert_eq!(contains_pattern("snake_case"), "%snake\\_case%");
        assert_eq!(contains_pattern("a\\b"), "%a\\\\b%");
    }

    #[test]
    fn search_pattern_follows_search() {
        let mut q = query(SortMode::Newest);
        assert_eq!(q.search_pattern(), None);
        q.search = Some("borrow".to_string());
        assert_eq!(q.search_pattern().as_deref(), Some("%borrow%"));
    }

    #[test]
    fn query_parameters_are_parsed() {
        let params: HashMap<String, String> = [
            ("search", " Hooks "),
            ("tags", "React, css,,"),
            ("sort", "trending"),
            ("page", "2"),
        ]
        .iter()
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

        let q = ListingQuery::from_params(&params, 20).unwrap();
        assert_eq!(q.search.as_deref(), Some("hooks"));
        assert_eq!(q.tags, vec!["react".to_string(), "css".to_string()]);
        assert_eq!(q.sort, SortMode::Trending);
        assert_eq!(q.pagination, Pagination { page: 2, per_page: 20 });
    }

    #[test]
    fn unknown_sort_mode_is_rejected() {
        let mut params = HashMap::new();
        params.insert("sort".to_string(), "oldest".to_string());
        assert!(matches!(
            ListingQuery::from_params(&params, 10),
            Err(Error::Validation(_))
        ));
    }
}
