//! Allowance allocation across trade targets.

use alloy::primitives::U256;

use crate::discovery::DiscoveredAsset;

/// One slice of the allowance, aimed at a single asset.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Allocation {
    pub asset: DiscoveredAsset,
    pub amount: U256,
}

/// The ordered per-asset split of a total allowance.
///
/// The total divides equally across `min(max_targets, assets.len())`
/// buckets; the integer remainder lands in the last bucket so the sum of
/// all amounts equals the input exactly. No unit is lost to rounding.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AllocationPlan {
    entries: Vec<Allocation>,
}

impl AllocationPlan {
    pub fn split(total: U256, assets: &[DiscoveredAsset], max_targets: usize) -> Self {
        let count = assets.len().min(max_targets);
        if count == 0 || total.is_zero() {
            return Self { entries: Vec::new() };
        }

        let buckets = U256::from(count);
        let share = total / buckets;
        let remainder = total - share * buckets;

        let entries = assets
            .iter()
            .take(count)
            .enumerate()
            .map(|(i, asset)| Allocation {
                asset: asset.clone(),
                amount: if i == count - 1 { share + remainder } else { share },
            })
            .collect();
        Self { entries }
    }

    pub fn entries(&self) -> &[Allocation] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn total(&self) -> U256 {
        self.entries
            .iter()
            .fold(U256::ZERO, |acc, a| acc + a.amount)
    }
}

impl<'a> IntoIterator for &'a AllocationPlan {
    type Item = &'a Allocation;
    type IntoIter = std::slice::Iter<'a, Allocation>;

    fn into_iter(self) -> Self::IntoIter {
        self.entries.iter()
    }
}
