//! Active payables and payment history.

use anyhow::Result;
use std::cmp::Ordering;
use std::collections::HashMap;

use super::actions::Actions;
use super::messages;
use super::replies;
use crate::conversation::Transition;
use crate::domain::StudentPayable;
use crate::sessions::State;

const ITEMS_PER_MESSAGE: usize = 5;
const MAX_MESSAGE_BYTES: usize = 1800;
const NOT_SPECIFIED: &str = "Not Specified";

/// Splits a long listing into messages of at most five items and roughly
/// 1800 bytes, each ending with a running "Showing n of total" line.
struct MessageBatcher {
    noun: &'static str,
    total: usize,
    shown: usize,
    current: String,
    batches: Vec<String>,
}

impl MessageBatcher {
    fn new(noun: &'static str, total: usize) -> Self {
        Self {
            noun,
            total,
            shown: 0,
            current: String::new(),
            batches: Vec::new(),
        }
    }

    fn flush(&mut self) {
        if self.current.is_empty() {
            return;
        }
        let mut batch = std::mem::take(&mut self.current);
        batch.push_str(&format!(
            "\n\n_Showing {} of {} {}_",
            self.shown, self.total, self.noun
        ));
        self.batches.push(batch);
    }

    fn push_heading(&mut self, heading: &str) {
        if self.current.len() + heading.len() > MAX_MESSAGE_BYTES {
            self.flush();
        }
        self.current.push_str(heading);
    }

    fn push_item(&mut self, item: &str) {
        if self.current.len() + item.len() > MAX_MESSAGE_BYTES {
            self.flush();
        }
        self.current.push_str(item);
        self.shown += 1;
        if self.shown % ITEMS_PER_MESSAGE == 0 {
            self.flush();
        }
    }

    fn finish(mut self) -> Vec<String> {
        self.flush();
        self.batches
    }
}

fn semester_rank(semester: &str) -> u8 {
    match semester {
        "1st Semester" => 1,
        "2nd Semester" => 2,
        "Summer" => 3,
        NOT_SPECIFIED => 99,
        _ => 4,
    }
}

/// Newest school year first, "Not Specified" last.
fn compare_years(a: &str, b: &str) -> Ordering {
    match (a == NOT_SPECIFIED, b == NOT_SPECIFIED) {
        (true, true) => Ordering::Equal,
        (true, false) => Ordering::Greater,
        (false, true) => Ordering::Less,
        (false, false) => b.cmp(a),
    }
}

type Term<'a> = (String, Vec<(String, Vec<&'a StudentPayable>)>);

/// Group payables by school year then semester, both in display order.
fn group_by_term(payables: &[StudentPayable]) -> Vec<Term<'_>> {
    let mut years: HashMap<String, HashMap<String, Vec<&StudentPayable>>> = HashMap::new();
    for payable in payables {
        let year = payable
            .school_year
            .as_deref()
            .filter(|y| !y.is_empty())
            .unwrap_or(NOT_SPECIFIED);
        let semester = match payable.semester.as_str() {
            "" | "." => NOT_SPECIFIED,
            other => other,
        };
        years
            .entry(year.to_string())
            .or_default()
            .entry(semester.to_string())
            .or_default()
            .push(payable);
    }

    let mut grouped: Vec<Term<'_>> = years
        .into_iter()
        .map(|(year, semesters)| {
            let mut semesters: Vec<_> = semesters.into_iter().collect();
            semesters.sort_by(|a, b| {
                semester_rank(&a.0)
                    .cmp(&semester_rank(&b.0))
                    .then_with(|| a.0.cmp(&b.0))
            });
            (year, semesters)
        })
        .collect();
    grouped.sort_by(|a, b| compare_years(&a.0, &b.0));
    grouped
}

impl Actions {
    /// Active payables grouped by term; enters `ViewPayables`.
    pub async fn payables(&self, psid: &str) -> Result<Transition> {
        let active = match self.active_student(psid).await? {
            Ok(active) => active,
            Err(denied) => return Ok(denied),
        };
        let student = &active.student;
        let transition = Transition::enter(State::ViewPayables);

        let payables = self
            .repos
            .payables
            .active_payables(&student.school.school_id, &student.student_id)
            .await?;
        if payables.is_empty() {
            return Ok(transition.with_quick_replies(messages::NO_PAYABLES, replies::back()));
        }

        let grouped = group_by_term(&payables);
        let total_balance: f64 = payables.iter().map(|p| p.total_amount_to_pay).sum();
        let terms: usize = grouped.iter().map(|(_, semesters)| semesters.len()).sum();

        let summary = format!(
            "📋 *Your Active Payables*\n\n\
👤 *{} {}*\n\
📝 Student ID: {}\n\
🏫 {}\n\n\
*Total Balance: ₱{total_balance:.2}*\n\
*{} payment(s) across {terms} term(s)*\n\n\
Here are your payables, grouped by school term:",
            student.first_name,
            student.last_name,
            student.student_id,
            student.school.school_name,
            payables.len(),
        );

        let mut batcher = MessageBatcher::new("payables", payables.len());
        for (year, semesters) in &grouped {
            for (semester, items) in semesters {
                batcher.push_heading(&format!("\n📚 *{year}* • {semester}\n"));
                for payable in items {
                    let kind = payable
                        .kind
                        .as_deref()
                        .filter(|k| !k.is_empty())
                        .unwrap_or("Not specified");
                    batcher.push_item(&format!(
                        "➤ *{}*\n   SOA ID: {}\n   Amount: ₱{:.2}\n   Type: {kind}\n\n",
                        payable.particulars, payable.soa_id, payable.total_amount_to_pay
                    ));
                }
            }
        }

        let mut transition = transition.with_text(summary);
        for batch in batcher.finish() {
            transition = transition.with_text(batch);
        }
        Ok(transition.with_quick_replies(messages::WHAT_NEXT, replies::payments()))
    }

    /// Payments made during the current year, newest first.
    pub async fn payment_logs(&self, psid: &str) -> Result<Transition> {
        let active = match self.active_student(psid).await? {
            Ok(active) => active,
            Err(denied) => return Ok(denied),
        };
        let student = &active.student;
        let period = self.current_year()?;

        let mut logs = self
            .repos
            .payment_logs
            .payment_logs(&student.school.school_id, &student.student_id, period)
            .await?;
        if logs.is_empty() {
            return Ok(Transition::quick_replies(
                messages::NO_PAYMENT_LOGS,
                replies::back(),
            ));
        }
        logs.sort_by(|a, b| b.paid_at.cmp(&a.paid_at));

        let total_paid: f64 = logs.iter().map(|l| l.amount).sum();
        let summary = format!(
            "💳 *Your Payment History*\n\n\
👤 *{} {}*\n\
📝 Student ID: {}\n\
🏫 {}\n\n\
*Total Payments: ₱{total_paid:.2}*\n\
*{} transaction(s) found*\n\n\
Here are your payment records:",
            student.first_name,
            student.last_name,
            student.student_id,
            student.school.school_name,
            logs.len(),
        );

        let mut batcher = MessageBatcher::new("transactions", logs.len());
        for log in &logs {
            let paid_at = log.paid_at.with_timezone(&self.timezone);
            batcher.push_item(&format!(
                "\n📅 *{}*\n   Transaction ID: {}\n   Amount: ₱{:.2}\n   Status: {}\n   Reference: {}\n   Payment Type: {}\n   SOA ID: {}\n",
                paid_at.format("%B %-d, %Y %-I:%M %p"),
                log.payment_txn_id,
                log.amount,
                log.status,
                log.process_id,
                log.payment_type,
                log.soa_id,
            ));
        }

        let mut transition = Transition::text(summary);
        for batch in batcher.finish() {
            transition = transition.with_text(batch);
        }
        Ok(transition.with_quick_replies(messages::WHAT_NEXT, replies::back()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payable(year: Option<&str>, semester: &str, particulars: &str) -> StudentPayable {
        StudentPayable {
            school_id: "cpeu".into(),
            student_id: "s1".into(),
            soa_id: format!("SOA-{particulars}"),
            particulars: particulars.into(),
            total_amount_to_pay: 100.0,
            kind: None,
            school_year: year.map(str::to_string),
            semester: semester.into(),
            is_active: true,
        }
    }

    #[test]
    fn terms_sort_newest_year_first_and_unknown_last() {
        let payables = vec![
            payable(None, "", "a"),
            payable(Some("2023-2024"), "Summer", "b"),
            payable(Some("2024-2025"), "2nd Semester", "c"),
            payable(Some("2024-2025"), "1st Semester", "d"),
            payable(Some("2024-2025"), "Midyear", "e"),
            payable(Some("2024-2025"), ".", "f"),
        ];
        let grouped = group_by_term(&payables);

        let years: Vec<&str> = grouped.iter().map(|(y, _)| y.as_str()).collect();
        assert_eq!(years, vec!["2024-2025", "2023-2024", NOT_SPECIFIED]);

        let semesters: Vec<&str> = grouped[0].1.iter().map(|(s, _)| s.as_str()).collect();
        assert_eq!(
            semesters,
            vec!["1st Semester", "2nd Semester", "Midyear", NOT_SPECIFIED]
        );
    }

    #[test]
    fn batches_hold_five_items_with_running_count() {
        let mut batcher = MessageBatcher::new("payables", 7);
        for i in 0..7 {
            batcher.push_item(&format!("item {i}\n"));
        }
        let batches = batcher.finish();
        assert_eq!(batches.len(), 2);
        assert!(batches[0].ends_with("_Showing 5 of 7 payables_"));
        assert!(batches[1].ends_with("_Showing 7 of 7 payables_"));
    }

    #[test]
    fn oversized_batches_are_split_by_length() {
        let mut batcher = MessageBatcher::new("transactions", 3);
        let big = "x".repeat(1000);
        for _ in 0..3 {
            batcher.push_item(&big);
        }
        let batches = batcher.finish();
        assert_eq!(batches.len(), 3);
        assert!(batches[0].ends_with("_Showing 1 of 3 transactions_"));
    }
}
