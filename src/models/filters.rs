use serde::Deserialize;
use uuid::Uuid;

use super::enums::HealthStatus;

pub const DEFAULT_PAGE_SIZE: u32 = 20;
pub const MAX_PAGE_SIZE: u32 = 100;

/// 1-based page request. Out-of-range values are clamped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Page {
    pub page: u32,
    pub page_size: u32,
}

impl Page {
    pub fn new(page: Option<u32>, page_size: Option<u32>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(DEFAULT_PAGE_SIZE)
                .clamp(1, MAX_PAGE_SIZE),
        }
    }

    pub fn limit(&self) -> i64 {
        i64::from(self.page_size)
    }

    pub fn offset(&self) -> i64 {
        i64::from(self.page - 1) * i64::from(self.page_size)
    }
}

impl Default for Page {
    fn default() -> Self {
        Self::new(None, None)
    }
}

/// Row visibility for list queries, derived from the caller's role.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Scope {
    All,
    Doctor(Uuid),
    Patient(Uuid),
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct PrescriptionFilter {
    pub doctor_id: Option<Uuid>,
    pub patient_id: Option<Uuid>,
    pub checked: Option<bool>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct FilePrescriptionFilter {
    pub prescription_id: Option<Uuid>,
    pub uploaded: Option<bool>,
    pub checked: Option<bool>,
    pub status: Option<HealthStatus>,
}

#[derive(Debug, Default, Clone, Deserialize)]
pub struct DataFileFilter {
    pub prescription_id: Option<Uuid>,
    pub file_prescription_id: Option<Uuid>,
    pub uploader_id: Option<Uuid>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn page_defaults() {
        let page = Page::default();
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, DEFAULT_PAGE_SIZE);
        assert_eq!(page.offset(), 0);
    }

    #[test]
    fn page_clamps_out_of_range_values() {
        let page = Page::new(Some(0), Some(10_000));
        assert_eq!(page.page, 1);
        assert_eq!(page.page_size, MAX_PAGE_SIZE);
    }

    #[test]
    fn page_offset_skips_previous_pages() {
        let page = Page::new(Some(3), Some(25));
        assert_eq!(page.offset(), 50);
        assert_eq!(page.limit(), 25);
    }
}
