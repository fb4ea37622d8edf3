use crate::fetcher::PerformanceClient;
use crate::schema::{EntityKind, NormalizedEntry, Scope, Target};
use crate::session::SessionContext;
use crate::transport::Transport;
use log::debug;
use std::collections::BTreeSet;

/// Every year in which at least one sale, order or target exists.
pub fn discover_years(
    sales: &[NormalizedEntry],
    orders: &[NormalizedEntry],
    targets: &[Target],
) -> BTreeSet<i32> {
    sales
        .iter()
        .chain(orders)
        .map(NormalizedEntry::year)
        .chain(targets.iter().map(|t| t.year))
        .collect()
}

impl<T: Transport> PerformanceClient<T> {
    /// Years with data visible under `scope`. The three collections are read concurrently.
    pub async fn available_years(&self, session: &SessionContext, scope: &Scope) -> BTreeSet<i32> {
        let (sales, orders, targets) = futures::join!(
            self.fetch_entity(session, EntityKind::Sale, scope, None),
            self.fetch_entity(session, EntityKind::Order, scope, None),
            self.fetch_targets(session, scope, None),
        );

        let years = discover_years(&sales, &orders, &targets);
        debug!(
            "Discovered {} year(s) from {} sales, {} orders, {} targets",
            years.len(),
            sales.len(),
            orders.len(),
            targets.len()
        );
        years
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::TargetType;
    use chrono::{TimeZone, Utc};

    fn entry(kind: EntityKind, year: i32) -> NormalizedEntry {
        NormalizedEntry {
            id: format!("{}-{}", kind, year),
            kind,
            client_name: "Client".to_string(),
            amount: 1.0,
            quantity: 1,
            date: Utc.with_ymd_and_hms(year, 6, 1, 0, 0, 0).unwrap(),
            employee_id: None,
            team_id: None,
        }
    }

    fn target(year: i32) -> Target {
        Target {
            id: format!("t-{}", year),
            employee_id: "e1".to_string(),
            target_type: TargetType::Sale,
            target_amount: 100.0,
            target_qty: 0.0,
            month: 1,
            year,
        }
    }

    #[test]
    fn test_discover_years_union() {
        let sales = vec![entry(EntityKind::Sale, 2023)];
        let orders = vec![entry(EntityKind::Order, 2024)];
        let targets = vec![target(2023), target(2025)];

        let years = discover_years(&sales, &orders, &targets);
        assert_eq!(years.into_iter().collect::<Vec<_>>(), vec![2023, 2024, 2025]);
    }

    #[test]
    fn test_discover_years_ignores_input_order() {
        let sales = vec![entry(EntityKind::Sale, 2021), entry(EntityKind::Sale, 2019)];
        let reversed: Vec<NormalizedEntry> = sales.iter().rev().cloned().collect();
        let targets = vec![target(2020)];

        assert_eq!(
            discover_years(&sales, &[], &targets),
            discover_years(&[], &reversed, &targets)
        );
        assert!(discover_years(&[], &[], &[]).is_empty());
    }
}
