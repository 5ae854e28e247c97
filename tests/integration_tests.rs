use chrono::NaiveDate;
use iris_revenue::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn day(month: u32, day: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(2024, month, day).unwrap()
}

fn fixed_price(budget: f64, hours: Vec<HourEntry>, lines: Vec<ProjectLine>) -> Project {
    Project::new(1, "Fixed price", ProjectType::FixedPrice)
        .with_budget(budget, 0.0)
        .with_hours(hours)
        .with_lines(lines)
}

fn random_entry(rng: &mut StdRng) -> HourEntry {
    let hours = match rng.gen_range(0..20) {
        0 => f64::NAN,
        1 => -rng.gen_range(0.0..8.0),
        _ => rng.gen_range(0.0..40.0),
    };
    let rate = match rng.gen_range(0..20) {
        0 => 0.0,
        1 => f64::INFINITY,
        _ => rng.gen_range(10.0..150.0),
    };

    let mut entry = HourEntry::new(day(rng.gen_range(1..=12), rng.gen_range(1..=28)), hours, rate)
        .with_invoice_basis(rng.gen_range(0..=4));
    if rng.gen_bool(0.8) {
        entry = entry.with_line(rng.gen_range(1..=4));
    }
    entry
}

fn random_project(rng: &mut StdRng) -> Project {
    let hours: Vec<HourEntry> = (0..rng.gen_range(0..60)).map(|_| random_entry(rng)).collect();
    let lines: Vec<ProjectLine> = (1..=3)
        .map(|id| ProjectLine::new(id, rng.gen_range(0.0..80.0), rng.gen_range(0.0..120.0)))
        .collect();
    let total = rng.gen_range(0.0..20_000.0);
    let previous = if rng.gen_bool(0.3) {
        rng.gen_range(0.0..25_000.0)
    } else {
        0.0
    };

    Project::new(rng.gen(), "Random", ProjectType::FixedPrice)
        .with_budget(total, previous)
        .with_hours(hours)
        .with_lines(lines)
}

fn both_views(engine: &RevenueEngine, project: &Project) -> [MonthlyRevenueResult; 2] {
    let available = project.available_budget();
    [
        engine.project_max(&project.hour_details, available),
        engine.line_max(&project.hour_details, &project.project_lines, available),
    ]
}

#[test]
fn test_scenario_within_budget() {
    let project = fixed_price(1000.0, vec![HourEntry::new(day(1, 8), 10.0, 50.0)], vec![]);
    let result = calculate_project_max_revenue(&project, project.available_budget());

    assert_eq!(result.monthly_revenue[0], 500.0);
    assert_eq!(result.total_revenue, 500.0);
    assert!(!result.is_over_budget);
    assert_eq!(result.remaining_budget, 500.0);
}

#[test]
fn test_scenario_clipped_entry() {
    let project = fixed_price(1000.0, vec![HourEntry::new(day(1, 8), 30.0, 50.0)], vec![]);
    let result = calculate_project_max_revenue(&project, project.available_budget());

    assert_eq!(result.monthly_revenue[0], 1000.0);
    assert!(result.is_over_budget);
    assert!(result.monthly_over_budget[0]);
    assert_eq!(result.remaining_budget, 0.0);
}

#[test]
fn test_scenario_partial_clip_within_month() {
    let project = fixed_price(
        1000.0,
        vec![
            HourEntry::new(day(1, 8), 12.0, 50.0),
            HourEntry::new(day(1, 9), 12.0, 50.0),
        ],
        vec![],
    );
    let result = calculate_project_max_revenue(&project, 1000.0);

    assert_eq!(result.monthly_revenue[0], 1000.0);
    assert!(result.is_over_budget);
}

#[test]
fn test_scenario_non_billable() {
    let project = fixed_price(
        1000.0,
        vec![HourEntry::new(day(5, 8), 100.0, 100.0).with_invoice_basis(4)],
        vec![],
    );
    let result = calculate_project_max_revenue(&project, 1000.0);

    assert_eq!(result.monthly_revenue[4], 0.0);
    assert_eq!(result.remaining_budget, 1000.0);
}

#[test]
fn test_scenario_hourly_basis_with_empty_budget() {
    let project = fixed_price(
        0.0,
        vec![HourEntry::new(day(5, 8), 10.0, 80.0).with_invoice_basis(2)],
        vec![],
    );
    let result = calculate_project_max_revenue(&project, 0.0);

    assert_eq!(result.total_revenue, 800.0);
    assert_eq!(result.remaining_budget, 0.0);
    assert!(!result.is_over_budget);
}

#[test]
fn test_scenario_line_max() {
    let project = fixed_price(
        50_000.0,
        vec![HourEntry::new(day(1, 8), 12.0, 50.0).with_line(1)],
        vec![ProjectLine::new(1, 10.0, 50.0)],
    );
    let result = calculate_line_max_revenue(&project, project.available_budget());

    assert_eq!(result.monthly_revenue[0], 500.0);
    assert!(result.monthly_over_budget[0]);
    assert_eq!(result.remaining_budget, 49_500.0);
}

#[test]
fn test_random_projects_hold_revenue_invariants() {
    let engine = RevenueEngine::default();
    let mut rng = StdRng::seed_from_u64(0x1815);

    for _ in 0..300 {
        let project = random_project(&mut rng);
        let available = project.available_budget();

        for result in both_views(&engine, &project) {
            // Non-negativity
            assert!(result.monthly_revenue.iter().all(|v| *v >= 0.0 && v.is_finite()));
            assert!(result.total_revenue >= 0.0);
            assert!(result.remaining_budget >= 0.0);

            // The budget cap is exact
            assert!(
                result.capped_revenue <= available,
                "capped {} > available {}",
                result.capped_revenue,
                available
            );

            assert_eq!(result.is_over_budget, result.monthly_over_budget.iter().any(|f| *f));
        }

        // Once the project pool runs dry, every later month stays flagged
        let project_max = &both_views(&engine, &project)[0];
        if let Some(first) = project_max.monthly_over_budget.iter().position(|f| *f) {
            assert!(project_max.monthly_over_budget[first..].iter().all(|f| *f));
        }
    }
}

#[test]
fn test_non_billable_entries_never_change_the_result() {
    let engine = RevenueEngine::default();
    let mut rng = StdRng::seed_from_u64(42);

    for _ in 0..100 {
        let project = random_project(&mut rng);
        let baseline = both_views(&engine, &project);

        let mut hours = project.hour_details.clone();
        let position = rng.gen_range(0..=hours.len());
        hours.insert(
            position,
            HourEntry::new(day(rng.gen_range(1..=12), 1), 200.0, 150.0)
                .with_invoice_basis(4)
                .with_line(1),
        );
        let with_non_billable = project.clone().with_hours(hours);

        assert_eq!(both_views(&engine, &with_non_billable), baseline);
    }
}

#[test]
fn test_hourly_basis_entries_never_touch_the_budget() {
    let engine = RevenueEngine::default();
    let mut rng = StdRng::seed_from_u64(7);

    for _ in 0..100 {
        let project = random_project(&mut rng);
        let with_hourly = both_views(&engine, &project);

        let without: Vec<HourEntry> = project
            .hour_details
            .iter()
            .filter(|h| h.invoice_basis_id != 2)
            .cloned()
            .collect();
        let expected_uncapped: f64 = project
            .hour_details
            .iter()
            .filter(|h| h.invoice_basis_id == 2)
            .map(|h| h.nominal_revenue())
            .sum();
        let without_hourly = both_views(&engine, &project.clone().with_hours(without));

        for (a, b) in with_hourly.iter().zip(without_hourly.iter()) {
            assert_eq!(a.capped_revenue, b.capped_revenue);
            assert_eq!(a.remaining_budget, b.remaining_budget);
            assert_eq!(a.monthly_over_budget, b.monthly_over_budget);
            assert!((a.uncapped_revenue - expected_uncapped).abs() < 1e-6);
        }
    }
}

#[test]
fn test_engine_is_deterministic() {
    let engine = RevenueEngine::default();
    let mut rng = StdRng::seed_from_u64(99);

    for _ in 0..50 {
        let project = random_project(&mut rng);
        let first = engine.calculate(&project);
        let second = engine.calculate(&project);
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}

#[test]
fn test_two_period_view_never_exceeds_contract() {
    let engine = RevenueEngine::default();
    let hours_2024 = vec![
        HourEntry::new(day(3, 1), 40.0, 100.0),
        HourEntry::new(day(9, 1), 40.0, 100.0),
    ];
    let project_2024 = Project::new(8, "Platform", ProjectType::FixedPrice)
        .with_budget(10_000.0, 0.0)
        .with_hours(hours_2024);
    let first_year = engine.calculate(&project_2024);
    assert_eq!(first_year.project_max.total_revenue, 8_000.0);

    let used = project_2024.budget_used_after(&first_year.project_max);
    let hours_2025 = vec![HourEntry::new(
        NaiveDate::from_ymd_opt(2025, 1, 20).unwrap(),
        40.0,
        100.0,
    )];
    let project_2025 = project_2024.clone().with_budget(10_000.0, used).with_hours(hours_2025);
    let second_year = engine.calculate(&project_2025);

    assert_eq!(second_year.available_budget, 2_000.0);
    assert_eq!(second_year.project_max.total_revenue, 2_000.0);
    assert!(second_year.project_max.is_over_budget);
    assert_eq!(
        first_year.project_max.total_revenue + second_year.project_max.total_revenue,
        10_000.0
    );
}

#[test]
fn test_snapshot_report_exports() -> anyhow::Result<()> {
    let snapshot = SyncSnapshot::from_json_str(
        r#"{
            "year": 2024,
            "projects": [
                {"id": 1, "name": "Portal, \"v2\"", "tags": [{"id": 3, "name": "Vaste Prijs"}],
                 "total_budget": 2000, "lines": [{"id": 9, "amount": 20, "selling_price": 100}]},
                {"id": 2, "name": "Kantoor intern"}
            ],
            "hours": [
                {"id": 1, "project_id": 1, "date": "2024-04-02", "amount": 15, "project_line_id": 9},
                {"id": 2, "project_id": 1, "date": "2024-05-02", "amount": 15, "project_line_id": 9},
                {"id": 3, "project_id": 2, "date": "2024-05-02", "amount": 8}
            ]
        }"#,
    )?;

    let processor = RevenueProcessor::new(EngineSettings::default())?;
    let report = processor.process_snapshot(&snapshot)?;

    let csv_text = report.to_csv();
    let mut reader = csv::Reader::from_reader(csv_text.as_bytes());
    let headers = reader.headers()?.clone();
    assert_eq!(&headers[0], "Project ID");
    assert_eq!(&headers[3], "Jan");
    assert_eq!(&headers[17], "Remaining Budget");

    let records: Vec<csv::StringRecord> = reader.records().collect::<std::result::Result<_, _>>()?;
    assert_eq!(records.len(), 2);
    assert_eq!(&records[0][1], "Portal, \"v2\"");
    assert_eq!(&records[0][2], "Vaste Prijs");
    assert_eq!(&records[0][6], "1500.00");
    assert_eq!(&records[0][7], "500.00");
    assert_eq!(&records[0][16], "true");
    assert_eq!(&records[1][2], "Intern");
    assert_eq!(&records[1][15], "0.00");

    let json: serde_json::Value = serde_json::from_str(&report.to_json()?)?;
    assert_eq!(json["year"], 2024);
    assert_eq!(json["overBudgetProjects"], 1);
    assert_eq!(json["projects"][0]["revenue"]["projectMax"]["isOverBudget"], true);

    Ok(())
}

#[test]
fn test_snapshot_with_unusable_rows_still_reports() -> anyhow::Result<()> {
    let snapshot = SyncSnapshot::from_json_str(
        r#"{
            "year": 2024,
            "projects": [
                {"id": "1", "name": "Support", "type_override": "Nacalculatie"},
                {"id": null, "name": "Ghost"}
            ],
            "hours": [
                {"id": 1, "project_id": 1, "date": "2024-02-05", "amount": 3},
                {"id": 2, "project_id": "1", "date": "2024-02-06", "amount": "2"},
                {"id": 3, "project_id": 1, "date": null, "amount": 8},
                {"id": 4, "project_id": "support", "date": "2024-02-07", "amount": 8},
                {"id": 5, "project_id": 1, "date": "2024-02-08", "amount": "lots"}
            ]
        }"#,
    )?;

    let report = process_snapshot(&snapshot, &EngineSettings::default())?;

    assert_eq!(report.projects.len(), 1);
    let support = report.project(1).expect("support project is reported");
    assert_eq!(support.project_type, ProjectType::TimeAndMaterials);
    assert_eq!(support.revenue.shown().monthly_revenue[1], 500.0);
    assert_eq!(support.hours.total_hours(), 5.0);
    assert_eq!(report.total_revenue, 500.0);
    Ok(())
}

#[test]
fn test_schemas_generate() -> anyhow::Result<()> {
    let report_schema = serde_json::to_string(&RevenueReport::generate_json_schema())?;
    assert!(report_schema.contains("monthlyTotals"));

    let settings_schema = serde_json::to_string(&EngineSettings::generate_json_schema())?;
    assert!(settings_schema.contains("fallbackHourlyRate"));

    assert!(Project::schema_as_json()?.contains("projectLines"));
    Ok(())
}
