//! Read-only projections of a [`DashboardStore`] for tiles, tables and charts.

use std::collections::BTreeMap;

use chrono::{Datelike, NaiveDate};
use serde::Serialize;

use crate::models::{AttendanceStatus, ProjectStatus, Worker};
use crate::utils::dates::{age_on, anniversary_in};

use super::store::DashboardStore;

pub const WORKERS_PER_PAGE: usize = 20;
pub const MAX_UPCOMING_EVENTS: usize = 5;
pub const UNASSIGNED_LABEL: &str = "Unassigned";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Absentee {
    pub worker_id: i32,
    pub name: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AttendanceSummary {
    pub present: usize,
    pub absent: usize,
    pub absentees: Vec<Absentee>,
}

pub fn attendance_summary(store: &DashboardStore) -> AttendanceSummary {
    let mut summary = AttendanceSummary::default();
    for worker in store.workers() {
        match worker.attendance_status {
            AttendanceStatus::Present => summary.present += 1,
            AttendanceStatus::Absent => {
                summary.absent += 1;
                summary.absentees.push(Absentee {
                    worker_id: worker.id,
                    name: worker.full_name.clone(),
                    reason: worker.attendance_reason.clone(),
                });
            }
        }
    }
    summary
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TradeTally {
    pub trade: String,
    pub total: usize,
    pub present: usize,
}

fn trade_of(worker: &Worker) -> Option<&str> {
    worker
        .trade
        .as_deref()
        .map(str::trim)
        .filter(|trade| !trade.is_empty())
}

/// Per-trade headcount and present count, sorted by trade. Workers without a trade are skipped.
pub fn trade_tally(store: &DashboardStore) -> Vec<TradeTally> {
    let mut tally: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for worker in store.workers() {
        if let Some(trade) = trade_of(worker) {
            let entry = tally.entry(trade).or_default();
            entry.0 += 1;
            if worker.attendance_status == AttendanceStatus::Present {
                entry.1 += 1;
            }
        }
    }
    tally
        .into_iter()
        .map(|(trade, (total, present))| TradeTally {
            trade: trade.to_string(),
            total,
            present,
        })
        .collect()
}

/// Chart series of `(label, count)`.
pub type Series = Vec<(String, usize)>;

pub fn workforce_series(store: &DashboardStore) -> Series {
    trade_tally(store)
        .into_iter()
        .map(|tally| (tally.trade, tally.total))
        .collect()
}

pub fn area_series(store: &DashboardStore) -> Series {
    let mut counts: BTreeMap<String, usize> = BTreeMap::new();
    for worker in store.workers() {
        let label = match worker.area.as_deref() {
            Some(area) if worker.is_assigned() && !area.trim().is_empty() => area.trim(),
            _ => UNASSIGNED_LABEL,
        };
        *counts.entry(label.to_string()).or_default() += 1;
    }
    counts.into_iter().collect()
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProjectCard {
    pub project_id: String,
    pub name: String,
    pub areas: Vec<String>,
    pub status: ProjectStatus,
    pub start_date: NaiveDate,
    pub target_date: NaiveDate,
    pub assigned_workers: usize,
}

pub fn project_cards(store: &DashboardStore) -> Vec<ProjectCard> {
    store
        .projects()
        .iter()
        .map(|project| ProjectCard {
            project_id: project.id.clone(),
            name: project.name.clone(),
            areas: project.areas().into_iter().map(str::to_string).collect(),
            status: project.status,
            start_date: project.start_date,
            target_date: project.target_date,
            assigned_workers: store
                .workers()
                .iter()
                .filter(|worker| worker.project_id == project.id)
                .count(),
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FundSummary {
    pub project_id: String,
    pub name: String,
    pub received_cents: i64,
    pub spent_cents: i64,
    pub remaining_cents: i64,
}

pub fn fund_summary(store: &DashboardStore) -> Vec<FundSummary> {
    store
        .projects()
        .iter()
        .map(|project| FundSummary {
            project_id: project.id.clone(),
            name: project.name.clone(),
            received_cents: project.total_cents,
            spent_cents: project.spent_cents,
            remaining_cents: project.remaining_cents(),
        })
        .collect()
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum EventKind {
    Birthday,
    Anniversary,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct UpcomingEvent {
    pub kind: EventKind,
    pub date: NaiveDate,
    pub worker_id: i32,
    pub worker_name: String,
    pub is_today: bool,
}

/// Birthdays and anniversaries from `today` to the end of its year, soonest first.
pub fn upcoming_events(store: &DashboardStore, today: NaiveDate) -> Vec<UpcomingEvent> {
    let mut events = Vec::new();
    for worker in store.workers() {
        let dates = [
            (EventKind::Birthday, worker.birthday),
            (EventKind::Anniversary, worker.wedding_anniversary),
        ];
        for (kind, date) in dates {
            let Some(date) = date.and_then(|date| anniversary_in(date, today.year())) else {
                continue;
            };
            if date >= today {
                events.push(UpcomingEvent {
                    kind,
                    date,
                    worker_id: worker.id,
                    worker_name: worker.full_name.clone(),
                    is_today: date == today,
                });
            }
        }
    }
    events.sort_by(|a, b| a.date.cmp(&b.date).then(a.worker_id.cmp(&b.worker_id)));
    events.truncate(MAX_UPCOMING_EVENTS);
    events
}

/// Case-insensitive match on name or assigned number; an empty query matches everyone.
pub fn search_workers<'a>(store: &'a DashboardStore, query: &str) -> Vec<&'a Worker> {
    let needle = query.trim().to_lowercase();
    store
        .workers()
        .iter()
        .filter(|worker| {
            needle.is_empty()
                || worker.full_name.to_lowercase().contains(&needle)
                || worker.assigned_number.to_lowercase().contains(&needle)
        })
        .collect()
}

#[derive(Debug, Clone, PartialEq)]
pub struct Page<'a, T> {
    pub items: &'a [T],
    pub page: usize,
    pub total_pages: usize,
}

/// 1-based page of `items`; out-of-range pages clamp to the last one.
pub fn paginate<T>(items: &[T], page: usize) -> Page<'_, T> {
    let total_pages = items.len().div_ceil(WORKERS_PER_PAGE).max(1);
    let page = page.clamp(1, total_pages);
    let start = (page - 1) * WORKERS_PER_PAGE;
    let end = (start + WORKERS_PER_PAGE).min(items.len());
    Page {
        items: &items[start..end],
        page,
        total_pages,
    }
}

pub fn worker_age(worker: &Worker, today: NaiveDate) -> Option<u32> {
    worker.birthday.and_then(|birthday| age_on(birthday, today))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::client::store::tests::{project, worker};
    use crate::models::Snapshot;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    fn store() -> DashboardStore {
        let mut ana = worker(1, "Ana Cruz", Some("Mason"));
        ana.birthday = Some(date(1990, 6, 15));
        ana.project_id = "p-1".to_string();
        ana.area = Some("Roof".to_string());

        let mut ben = worker(2, "Ben Reyes", Some("Carpenter"));
        ben.attendance_status = AttendanceStatus::Absent;
        ben.attendance_reason = Some("Fever".to_string());
        ben.wedding_anniversary = Some(date(2015, 3, 1));

        let mut cora = worker(3, "Cora Lim", Some("Mason"));
        cora.birthday = Some(date(1985, 12, 24));
        cora.wedding_anniversary = Some(date(2010, 6, 15));

        let dan = worker(4, "Dan Uy", None);

        let mut funded = project("p-1", "Chapel", "Roof, Hall");
        funded.total_cents = 100_000;
        funded.spent_cents = 25_050;

        DashboardStore::from(Snapshot {
            workers: vec![ana, ben, cora, dan],
            projects: vec![funded],
            finance_entries: Vec::new(),
            leave_requests: Vec::new(),
        })
    }

    #[test]
    fn counts_attendance() {
        let summary = attendance_summary(&store());
        assert_eq!(summary.present, 3);
        assert_eq!(summary.absent, 1);
        assert_eq!(summary.absentees[0].reason.as_deref(), Some("Fever"));
    }

    #[test]
    fn tallies_trades_alphabetically() {
        let tally = trade_tally(&store());
        assert_eq!(
            tally,
            vec![
                TradeTally { trade: "Carpenter".into(), total: 1, present: 0 },
                TradeTally { trade: "Mason".into(), total: 2, present: 2 },
            ]
        );
        assert_eq!(workforce_series(&store())[1], ("Mason".to_string(), 2));
    }

    #[test]
    fn area_series_groups_unassigned() {
        assert_eq!(
            area_series(&store()),
            vec![("Roof".to_string(), 1), (UNASSIGNED_LABEL.to_string(), 3)]
        );
    }

    #[test]
    fn cards_and_funds_reflect_store() {
        let store = store();
        let cards = project_cards(&store);
        assert_eq!(cards[0].assigned_workers, 1);
        assert_eq!(cards[0].areas, vec!["Roof", "Hall"]);

        let funds = fund_summary(&store);
        assert_eq!(funds[0].remaining_cents, 74_950);
    }

    #[test]
    fn upcoming_events_start_today_and_stop_at_year_end() {
        let events = upcoming_events(&store(), date(2024, 6, 15));
        let summary: Vec<_> = events.iter().map(|e| (e.worker_id, e.kind, e.date)).collect();
        assert_eq!(
            summary,
            vec![
                (1, EventKind::Birthday, date(2024, 6, 15)),
                (3, EventKind::Anniversary, date(2024, 6, 15)),
                (3, EventKind::Birthday, date(2024, 12, 24)),
            ]
        );
        assert!(events[0].is_today);
    }

    #[test]
    fn upcoming_events_are_capped() {
        let workers = (1..=8)
            .map(|id| {
                let mut w = worker(id, &format!("W{id}"), None);
                w.birthday = Some(date(1990, 9, id as u32));
                w
            })
            .collect();
        let store = DashboardStore::from(Snapshot {
            workers,
            ..Default::default()
        });
        assert_eq!(upcoming_events(&store, date(2024, 1, 1)).len(), MAX_UPCOMING_EVENTS);
    }

    #[test]
    fn searches_name_and_number() {
        let store = store();
        let names: Vec<_> = search_workers(&store, "REY").iter().map(|w| w.id).collect();
        assert_eq!(names, vec![2]);
        assert_eq!(search_workers(&store, "n-3")[0].id, 3);
        assert_eq!(search_workers(&store, " ").len(), 4);
    }

    #[test]
    fn paginates_by_twenty() {
        let items: Vec<u32> = (0..45).collect();
        let last = paginate(&items, 3);
        assert_eq!(last.total_pages, 3);
        assert_eq!(last.items, &[40, 41, 42, 43, 44]);
        assert_eq!(paginate(&items, 9).page, 3);
        assert_eq!(paginate::<u32>(&[], 1).items.len(), 0);
    }

    #[test]
    fn computes_age() {
        let store = store();
        let ana = store.worker(1).unwrap();
        assert_eq!(worker_age(ana, date(2024, 6, 14)), Some(33));
        assert_eq!(worker_age(ana, date(2024, 6, 15)), Some(34));
        assert_eq!(worker_age(store.worker(4).unwrap(), date(2024, 6, 15)), None);
    }
}
