use serde::{Deserialize, Serialize};

const XP_PER_LEVEL: i64 = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Rank {
    Bronze,
    Silver,
    Gold,
    Platinum,
    Diamond,
    Master,
    Legend,
}

impl Rank {
    /// Ascending by required rank points.
    const LADDER: [(i64, Rank); 7] = [
        (0, Rank::Bronze),
        (100, Rank::Silver),
        (300, Rank::Gold),
        (700, Rank::Platinum),
        (1500, Rank::Diamond),
        (3000, Rank::Master),
        (6000, Rank::Legend),
    ];

    pub fn for_points(rank_points: i64) -> Rank {
        Self::LADDER
            .iter()
            .rev()
            .find(|(threshold, _)| rank_points >= *threshold)
            .map(|(_, rank)| *rank)
            .unwrap_or(Rank::Bronze)
    }

    pub fn name(&self) -> &'static str {
        match self {
            Rank::Bronze => "Bronze",
            Rank::Silver => "Silver",
            Rank::Gold => "Gold",
            Rank::Platinum => "Platinum",
            Rank::Diamond => "Diamond",
            Rank::Master => "Master",
            Rank::Legend => "Legend",
        }
    }
}

pub fn level_for_xp(xp_points: i64) -> i64 {
    xp_points.max(0) / XP_PER_LEVEL + 1
}
