//! Reporting hierarchy.
//!
//! Employees reference their manager by id (`reporting_to`). The chart keeps
//! employees in an arena keyed by id and resolves relationships through
//! lookup tables, so no cyclic object graph is ever built. Data is not
//! trusted to be acyclic or complete: walks stop at cycles and at references
//! to employees that are not in the chart (for example soft-deleted ones).

use std::collections::{HashMap, HashSet};

use crate::models::Employee;

#[derive(Debug, Default)]
pub struct OrgChart {
    employees: HashMap<i64, Employee>,
    reports: HashMap<i64, Vec<i64>>,
}

impl OrgChart {
    pub fn from_employees(employees: impl IntoIterator<Item = Employee>) -> Self {
        let mut chart = Self::default();
        for employee in employees {
            if let Some(manager) = employee.reporting_to {
                chart.reports.entry(manager).or_default().push(employee.id);
            }
            chart.employees.insert(employee.id, employee);
        }
        for ids in chart.reports.values_mut() {
            ids.sort_unstable();
        }
        chart
    }

    pub fn get(&self, id: i64) -> Option<&Employee> {
        self.employees.get(&id)
    }

    /// Employees whose `reporting_to` is `id`, ordered by id.
    pub fn direct_reports(&self, id: i64) -> Vec<&Employee> {
        self.reports
            .get(&id)
            .into_iter()
            .flatten()
            .filter_map(|rid| self.employees.get(rid))
            .collect()
    }

    /// The employee's manager, if it is in the chart.
    pub fn manager_of(&self, id: i64) -> Option<&Employee> {
        self.employees
            .get(&id)
            .and_then(|e| e.reporting_to)
            .and_then(|mid| self.employees.get(&mid))
    }

    /// Managers from the direct manager upwards.
    pub fn reporting_chain(&self, id: i64) -> Vec<&Employee> {
        let mut chain = Vec::new();
        let mut seen = HashSet::from([id]);
        let mut current = id;
        while let Some(manager) = self.manager_of(current) {
            if !seen.insert(manager.id) {
                break;
            }
            chain.push(manager);
            current = manager.id;
        }
        chain
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;

    use super::*;

    fn employee(id: i64, reporting_to: Option<i64>) -> Employee {
        let now = Utc::now();
        Employee {
            id,
            employee_id: format!("EMP{id:03}"),
            first_name: format!("E{id}"),
            last_name: String::new(),
            email: format!("e{id}@x.com"),
            password_hash: String::new(),
            phone: None,
            branch_id: None,
            department_id: None,
            designation_id: None,
            reporting_to,
            is_active: true,
            is_superadmin: false,
            last_login: None,
            created_by: None,
            updated_by: None,
            created_at: now,
            updated_at: now,
            deleted_at: None,
        }
    }

    fn ids(list: Vec<&Employee>) -> Vec<i64> {
        list.into_iter().map(|e| e.id).collect()
    }

    #[test]
    fn resolves_reports_and_chain() {
        let chart = OrgChart::from_employees([
            employee(1, None),
            employee(3, Some(1)),
            employee(2, Some(1)),
            employee(4, Some(2)),
        ]);
        assert_eq!(ids(chart.direct_reports(1)), vec![2, 3]);
        assert_eq!(ids(chart.direct_reports(4)), Vec::<i64>::new());
        assert_eq!(chart.manager_of(4).map(|e| e.id), Some(2));
        assert_eq!(ids(chart.reporting_chain(4)), vec![2, 1]);
    }

    #[test]
    fn chain_stops_at_cycles() {
        let chart = OrgChart::from_employees([employee(1, Some(2)), employee(2, Some(1))]);
        assert_eq!(ids(chart.reporting_chain(1)), vec![2]);
    }

    #[test]
    fn dangling_manager_is_ignored() {
        let chart = OrgChart::from_employees([employee(5, Some(99))]);
        assert!(chart.manager_of(5).is_none());
        assert!(chart.reporting_chain(5).is_empty());
    }
}
