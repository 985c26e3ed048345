use std::cmp::Ordering;

use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};

use common::prelude::{PeerIdentity, Recipient, StoredObject};

use super::storage::BlobMetadata;

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Column a listing is sorted on
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortKey {
    #[default]
    Name,
    Size,
    Created,
    Modified,
    Accessed,
}

impl SortKey {
    /// Keys match exactly; unknown or missing keys sort by name
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some("size") => SortKey::Size,
            Some("created") => SortKey::Created,
            Some("modified") => SortKey::Modified,
            Some("accessed") => SortKey::Accessed,
            _ => SortKey::Name,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SortOrder {
    #[default]
    Asc,
    Desc,
}

impl SortOrder {
    /// Only `desc` (any case) reverses; everything else is ascending
    pub fn parse(value: Option<&str>) -> Self {
        match value {
            Some(v) if v.eq_ignore_ascii_case("desc") => SortOrder::Desc,
            _ => SortOrder::Asc,
        }
    }
}

/// Query string of `GET /get_files`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ListQuery {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sort: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub order: Option<String>,
}

/// Catalog entry merged with what the filesystem says about its blob
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FileListing {
    /// Object id, also the download key
    pub name: String,
    pub original_name: String,
    pub sender: PeerIdentity,
    pub recipient: Recipient,
    pub size: u64,
    /// Unix seconds
    pub created: f64,
    pub modified: f64,
    pub accessed: f64,
    pub created_fmt: String,
    pub modified_fmt: String,
    pub size_fmt: String,
}

impl FileListing {
    pub fn new(object: &StoredObject, meta: &BlobMetadata) -> Self {
        Self {
            name: object.object_id.clone(),
            original_name: object.original_name.clone(),
            sender: object.sender.clone(),
            recipient: object.recipient.clone(),
            size: meta.size,
            created: unix_seconds(&meta.created),
            modified: unix_seconds(&meta.modified),
            accessed: unix_seconds(&meta.accessed),
            created_fmt: format_timestamp(&meta.created),
            modified_fmt: format_timestamp(&meta.modified),
            size_fmt: format_file_size(meta.size),
        }
    }

    fn compare(&self, other: &Self, key: SortKey) -> Ordering {
        let primary = match key {
            SortKey::Name => self.name.cmp(&other.name),
            SortKey::Size => self.size.cmp(&other.size),
            SortKey::Created => self.created.total_cmp(&other.created),
            SortKey::Modified => self.modified.total_cmp(&other.modified),
            SortKey::Accessed => self.accessed.total_cmp(&other.accessed),
        };
        primary.then_with(|| self.name.cmp(&other.name))
    }
}

pub fn sort_listings(listings: &mut [FileListing], key: SortKey, order: SortOrder) {
    listings.sort_by(|a, b| {
        let ord = a.compare(b, key);
        match order {
            SortOrder::Asc => ord,
            SortOrder::Desc => ord.reverse(),
        }
    });
}

fn unix_seconds(time: &DateTime<Utc>) -> f64 {
    time.timestamp_micros() as f64 / 1_000_000.0
}

fn format_timestamp(time: &DateTime<Utc>) -> String {
    time.with_timezone(&Local).format(TIMESTAMP_FORMAT).to_string()
}

pub fn format_file_size(size: u64) -> String {
    let mut size = size as f64;
    for unit in ["B", "KB", "MB", "GB", "TB"] {
        if size < 1024.0 {
            return format!("{:.1} {}", size, unit);
        }
        size /= 1024.0;
    }
    format!("{:.1} PB", size)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn listing(name: &str, size: u64, created: i64) -> FileListing {
        let ts = Utc.timestamp_opt(created, 0).unwrap();
        let object = StoredObject {
            object_id: name.to_string(),
            original_name: name.to_string(),
            size_bytes: size,
            sender: PeerIdentity::from("10.0.0.1"),
            recipient: Recipient::Everyone,
            created_at: ts,
        };
        let meta = BlobMetadata {
            size,
            created: ts,
            modified: ts,
            accessed: ts,
        };
        FileListing::new(&object, &meta)
    }

    fn sizes(listings: &[FileListing]) -> Vec<u64> {
        listings.iter().map(|l| l.size).collect()
    }

    #[test]
    fn test_sort_by_size() {
        let mut listings = vec![listing("a", 300, 1), listing("b", 100, 2), listing("c", 200, 3)];

        sort_listings(&mut listings, SortKey::Size, SortOrder::Asc);
        assert_eq!(sizes(&listings), vec![100, 200, 300]);

        sort_listings(&mut listings, SortKey::Size, SortOrder::Desc);
        assert_eq!(sizes(&listings), vec![300, 200, 100]);
    }

    #[test]
    fn test_sort_by_created() {
        let mut listings = vec![listing("a", 1, 30), listing("b", 1, 10), listing("c", 1, 20)];
        sort_listings(&mut listings, SortKey::Created, SortOrder::Asc);
        let names: Vec<_> = listings.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["b", "c", "a"]);
    }

    #[test]
    fn test_unknown_key_falls_back_to_name() {
        assert_eq!(SortKey::parse(Some("bogus")), SortKey::Name);
        assert_eq!(SortKey::parse(None), SortKey::Name);
        assert_eq!(SortKey::parse(Some("size")), SortKey::Size);
        assert_eq!(SortKey::parse(Some("accessed")), SortKey::Accessed);
        // keys are case-sensitive: anything but the exact name falls back
        assert_eq!(SortKey::parse(Some("SIZE")), SortKey::Name);
        assert_eq!(SortKey::parse(Some(" size")), SortKey::Name);

        let mut by_bogus = vec![listing("b", 3, 1), listing("c", 1, 1), listing("a", 2, 1)];
        let mut by_name = by_bogus.clone();
        sort_listings(&mut by_bogus, SortKey::parse(Some("bogus")), SortOrder::Asc);
        sort_listings(&mut by_name, SortKey::Name, SortOrder::Asc);
        assert_eq!(by_bogus, by_name);
    }

    #[test]
    fn test_order_parse() {
        assert_eq!(SortOrder::parse(Some("desc")), SortOrder::Desc);
        assert_eq!(SortOrder::parse(Some("DESC")), SortOrder::Desc);
        assert_eq!(SortOrder::parse(Some("asc")), SortOrder::Asc);
        assert_eq!(SortOrder::parse(Some("sideways")), SortOrder::Asc);
        assert_eq!(SortOrder::parse(None), SortOrder::Asc);
    }

    #[test]
    fn test_ties_break_on_name() {
        let mut listings = vec![listing("z", 5, 1), listing("m", 5, 1), listing("a", 5, 1)];
        sort_listings(&mut listings, SortKey::Size, SortOrder::Asc);
        let names: Vec<_> = listings.iter().map(|l| l.name.as_str()).collect();
        assert_eq!(names, vec!["a", "m", "z"]);
    }

    #[test]
    fn test_format_file_size() {
        assert_eq!(format_file_size(0), "0.0 B");
        assert_eq!(format_file_size(1023), "1023.0 B");
        assert_eq!(format_file_size(1536), "1.5 KB");
        assert_eq!(format_file_size(5 * 1024 * 1024), "5.0 MB");
        assert_eq!(format_file_size(1024u64.pow(5) * 2), "2.0 PB");
    }
}
