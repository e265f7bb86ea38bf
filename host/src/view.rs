//! Text rendering of the application page.

use std::fmt::{self, Write};

use crate::catalog::{find_matching_job, job_by_id, Job};
use crate::orchestrator::{JobsClient, SubmitOutcome};

pub const NOT_CONNECTED: &str = "Connect your wallet to apply 💼";
pub const NO_MATCH: &str = "No matching jobs found for your input.";

/// Form fields. Only experience and desired salary take part in matching.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct ApplicationForm {
    pub name: String,
    pub age: String,
    pub experience: String,
    pub desired_salary: String,
}

#[derive(Clone, Debug, Default)]
pub struct ApplicationView {
    pub form: ApplicationForm,
    matched: Option<&'static Job>,
    show_matched: bool,
    apply_confirmed: bool,
}

impl ApplicationView {
    pub fn new(form: ApplicationForm) -> Self {
        Self { form, ..Self::default() }
    }

    pub fn search(&mut self) -> Option<&'static Job> {
        self.show_matched = true;
        self.matched = find_matching_job(&self.form.desired_salary, &self.form.experience);
        self.matched
    }

    pub fn matched(&self) -> Option<&'static Job> {
        self.matched
    }

    pub fn apply_confirmed(&self) -> bool {
        self.apply_confirmed
    }

    /// Submits the matched job. The submitted view is only entered once the
    /// job id is stored.
    pub async fn apply(&mut self, client: &JobsClient) -> Option<SubmitOutcome> {
        let job = self.matched?;
        let outcome = client.submit_job(job.id).await;
        if outcome.is_stored() {
            self.apply_confirmed = true;
        }
        Some(outcome)
    }

    pub fn render(&self, client: &JobsClient) -> String {
        if !client.is_connected() {
            return format!("{NOT_CONNECTED}\n");
        }
        let mut out = String::new();
        // Writing into a String cannot fail.
        self.write_page(&mut out, client).ok();
        out
    }

    fn write_page(&self, out: &mut String, client: &JobsClient) -> fmt::Result {
        writeln!(out, "Encrypted Job Application")?;
        writeln!(out)?;

        if !self.apply_confirmed && !client.already_applied() {
            self.write_form(out)?;
        } else {
            write_submitted(out, client)?;
        }

        let status = client.status();
        if !status.is_empty() {
            writeln!(out)?;
            writeln!(out, "{status}")?;
        }
        Ok(())
    }

    fn write_form(&self, out: &mut String) -> fmt::Result {
        writeln!(out, "Full Name: {}", self.form.name)?;
        writeln!(out, "Age: {}", self.form.age)?;
        writeln!(out, "Experience: {}", self.form.experience)?;
        writeln!(out, "Desired Salary (USD): {}", self.form.desired_salary)?;

        if !self.show_matched {
            return Ok(());
        }
        writeln!(out)?;
        match self.matched {
            Some(job) => {
                writeln!(out, "{} [{}]", job.title, job.experience)?;
                writeln!(out, "Salary: ${}", job.salary)?;
                writeln!(out, "> Apply to this job")
            }
            None => writeln!(out, "{NO_MATCH}"),
        }
    }
}

fn write_submitted(out: &mut String, client: &JobsClient) -> fmt::Result {
    writeln!(out, "Application Submitted!")?;
    writeln!(out, "Your encrypted job ID has been stored on-chain ✅")?;

    let decrypted = client.decrypted_job_id();
    let offer_decrypt =
        client.already_applied() && decrypted.is_none() && (client.can_decrypt() || client.is_decrypting());
    if offer_decrypt {
        let label = if client.is_decrypting() { "Decrypting..." } else { "Decrypt to view job" };
        writeln!(out, "> {label}")?;
    }

    if let Some(id) = decrypted {
        let title = job_by_id(id).map(|job| job.title).unwrap_or_default();
        writeln!(out, "Decrypted Job ID: {id} — {title}")?;
    }
    Ok(())
}
