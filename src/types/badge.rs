use serde::{Deserialize, Serialize};

#[derive(Serialize, Deserialize, Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum BadgeId {
    FirstPost,
    FiftyUpvotes,
    HundredUpvotes,
}

impl BadgeId {
    pub fn as_str(&self) -> &'static str {
        match self {
            BadgeId::FirstPost => "first-post",
            BadgeId::FiftyUpvotes => "fifty-upvotes",
            BadgeId::HundredUpvotes => "hundred-upvotes",
        }
    }

    pub fn from_db(value: &str) -> Option<Self> {
        CATALOG
            .iter()
            .map(|badge| badge.id)
            .find(|id| id.as_str() == value)
    }

    pub fn badge(&self) -> Badge {
        match self {
            BadgeId::FirstPost => CATALOG[0],
            BadgeId::FiftyUpvotes => CATALOG[1],
            BadgeId::HundredUpvotes => CATALOG[2],
        }
    }
}

#[derive(Serialize, Debug, Clone, Copy, PartialEq, Eq)]
pub struct Badge {
    pub id: BadgeId,
    pub name: &'static str,
    pub description: &'static str,
    pub icon: &'static str,
    pub color: &'static str,
}

pub const CATALOG: [Badge; 3] = [
    Badge {
        id: BadgeId::FirstPost,
        name: "First Post",
        description: "Posted your first question or answer",
        icon: "🎯",
        color: "bg-blue-500",
    },
    Badge {
        id: BadgeId::FiftyUpvotes,
        name: "50 Upvotes",
        description: "Reached 50 reputation from upvotes",
        icon: "👍",
        color: "bg-green-500",
    },
    Badge {
        id: BadgeId::HundredUpvotes,
        name: "100 Upvotes",
        description: "Reached 100 reputation from upvotes",
        icon: "🔥",
        color: "bg-orange-500",
    },
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn catalog_ids_round_trip_through_db_names() {
        for badge in CATALOG.iter() {
            assert_eq!(BadgeId::from_db(badge.id.as_str()), Some(badge.id));
            assert_eq!(badge.id.badge(), *badge);
        }
        assert_eq!(BadgeId::from_db("expert"), None);
    }
}
