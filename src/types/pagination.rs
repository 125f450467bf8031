use handle_errors::Error;
use serde::Serialize;
use std::collections::HashMap;

/// Pagination 구조체는 쿼리 매개변수에서 추출된다
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pagination {
    /// 1부터 시작하는 페이지 번호
    pub page: u32,
    /// 한 페이지에 담기는 항목 수. 설정 파일의 page_size 값을 쓴다.
    pub per_page: u32,
}

impl Pagination {
    pub fn first(per_page: u32) -> Self {
        Pagination { page: 1, per_page }
    }

    /// SQL OFFSET 값. 범위를 넘으면 u32 최댓값에서 멈춘다.
    pub fn offset(&self) -> u32 {
        self.page.saturating_sub(1).saturating_mul(self.per_page)
    }
}

/// 매개변수를 목록 경로에서 추출하기
/// # 예제 쿼리
/// 목록 경로에 대한 GET 요청에는 원하는 페이지 번호를 붙일 수 있다
/// /questions?page=2
/// # 사용 예
/// ```rust
/// let mut query = HashMap::new();
/// query.insert("page".to_string(), "2".to_string());
/// let p = types::pagination::extract_pagination(&query, 10).unwrap();
/// assert_eq!(p.page, 2);
/// assert_eq!(p.offset(), 10);
/// ```
pub fn extract_pagination(
    params: &HashMap<String, String>,
    per_page: u32,
) -> Result<Pagination, Error> {
    let page = match params.get("page") {
        Some(page) => page.parse::<u32>().map_err(Error::ParseError)?,
        None => return Ok(Pagination::first(per_page)),
    };
    if page == 0 {
        return Err(Error::Validation("Page numbers start at 1".to_string()));
    }
    if (page - 1).checked_mul(per_page).is_none() {
        return Err(Error::Validation(format!("Page {} is out of range", page)));
    }

    Ok(Pagination { page, per_page })
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct PageInfo {
    pub current_page: u32,
    pub total_pages: u32,
    pub total_items: i64,
    pub has_next: bool,
    pub has_prev: bool,
}

impl PageInfo {
    pub fn new(pagination: &Pagination, total_items: i64) -> Self {
        let per_page = i64::from(pagination.per_page.max(1));
        let total_pages = ((total_items + per_page - 1) / per_page) as u32;
        PageInfo {
            current_page: pagination.page,
            total_pages,
            total_items,
            has_next: pagination.page < total_pages,
            has_prev: pagination.page > 1,
        }
    }
}

#[derive(Serialize, Debug, Clone, PartialEq)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub pagination: PageInfo,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn params(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect()
    }

    #[test]
    fn missing_page_defaults_to_first() {
        let p = extract_pagination(&params(&[]), 10).unwrap();
        assert_eq!(p, Pagination::first(10));
        assert_eq!(p.offset(), 0);
    }

    #[test]
    fn page_is_one_indexed() {
        let p = extract_pagination(&params(&[("page", "3")]), 10).unwrap();
        assert_eq!(p.offset(), 20);
        assert!(matches!(
            extract_pagination(&params(&[("page", "0")]), 10),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            extract_pagination(&params(&[("page", "two")]), 10),
            Err(Error::ParseError(_))
        ));
    }

    #[test]
    fn huge_page_is_rejected() {
        assert!(matches!(
            extract_pagination(&params(&[("page", "429496731")]), 10),
            Err(Error::Validation(_))
        ));
        let p = extract_pagination(&params(&[("page", "429496730")]), 10).unwrap();
        assert_eq!(p.offset(), 4_294_967_290);
    }

    #[test]
    fn offset_saturates_for_hand_built_pages() {
        let p = Pagination {
            page: u32::MAX,
            per_page: 50,
        };
        assert_eq!(p.offset(), u32::MAX);
    }

    #[test]
    fn page_info_reports_neighbours() {
        let info = PageInfo::new(&Pagination { page: 2, per_page: 2 }, 5);
        assert_eq!(
            info,
            PageInfo {
                current_page: 2,
                total_pages: 3,
                total_items: 5,
                has_next: true,
                has_prev: true,
            }
        );
    }

    #[test]
    fn page_past_the_end_has_no_next() {
        let info = PageInfo::new(&Pagination { page: 4, per_page: 2 }, 3);
        assert!(!info.has_next);
        assert_eq!(info.total_pages, 2);
    }
}
