//! Fixed job list and the client-side matching rule.

use serde::Serialize;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct Job {
    pub id: u32,
    pub title: &'static str,
    /// Monthly salary in USD.
    pub salary: u32,
    pub experience: &'static str,
}

pub const JOBS: [Job; 10] = [
    Job { id: 1, title: "Junior Frontend Developer", salary: 1000, experience: "<1 year" },
    Job { id: 2, title: "Frontend Developer", salary: 2000, experience: "1–3 years" },
    Job { id: 3, title: "Senior Frontend Developer", salary: 3500, experience: "3–5 years" },
    Job { id: 4, title: "Junior Backend Developer", salary: 1200, experience: "<1 year" },
    Job { id: 5, title: "Backend Developer", salary: 2200, experience: "1–3 years" },
    Job { id: 6, title: "Senior Backend Developer", salary: 4000, experience: "3–5 years" },
    Job { id: 7, title: "Blockchain Engineer", salary: 3000, experience: "1–5 years" },
    Job { id: 8, title: "Project Manager", salary: 4000, experience: "3–5 years" },
    Job { id: 9, title: "QA Engineer", salary: 1500, experience: "1–3 years" },
    Job { id: 10, title: "DevOps Engineer", salary: 3500, experience: "3–5 years" },
];

pub fn job_by_id(id: u32) -> Option<&'static Job> {
    JOBS.iter().find(|job| job.id == id)
}

fn first_number(text: &str) -> Option<u32> {
    let digits: String = text
        .chars()
        .skip_while(|c| !c.is_ascii_digit())
        .take_while(|c| c.is_ascii_digit())
        .collect();
    digits.parse().ok()
}

/// Minimum years of a job's experience band; `"<…"` bands start at zero.
pub fn parse_min_years(experience: &str) -> u32 {
    if experience.contains('<') {
        return 0;
    }
    first_number(experience).unwrap_or(0)
}

/// Years typed by the user. `"<1"` reads as zero, as does text without a
/// number.
pub fn parse_user_years(input: &str) -> u32 {
    if input.trim_start().starts_with('<') {
        return 0;
    }
    first_number(input).unwrap_or(0)
}

/// First job whose salary band `[salary, 1.5 × salary]` contains the desired
/// salary and whose minimum experience the user meets.
pub fn find_matching_job(desired_salary: &str, experience: &str) -> Option<&'static Job> {
    let desired: f64 = match desired_salary.trim() {
        "" => 0.0,
        s => s.parse().ok()?,
    };
    let user_years = parse_user_years(experience);
    JOBS.iter().find(|job| {
        let salary = f64::from(job.salary);
        desired >= salary && desired <= salary * 1.5 && user_years >= parse_min_years(job.experience)
    })
}
