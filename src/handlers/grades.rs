//! Grades by school year, the profile menu and enrolled subjects.

use anyhow::Result;
use std::collections::BTreeMap;
use std::fmt::Write;

use super::actions::Actions;
use super::messages;
use super::replies;
use crate::conversation::Transition;
use crate::domain::SubjectGrade;
use crate::sessions::{SelectionMap, SessionData, State};

/// Distinct school years, newest first.
fn school_years(grades: &[SubjectGrade]) -> Vec<String> {
    let mut years: Vec<String> = grades.iter().map(|g| g.school_year.clone()).collect();
    years.sort_unstable_by(|a, b| b.cmp(a));
    years.dedup();
    years
}

impl Actions {
    /// School-year chooser for grades; enters `ViewGrades`.
    pub async fn grade_years(&self, psid: &str) -> Result<Transition> {
        let active = match self.active_student(psid).await? {
            Ok(active) => active,
            Err(denied) => return Ok(denied),
        };
        let grades = self
            .repos
            .grades
            .grades(&active.student.school.school_id, &active.student.student_id)
            .await?;

        let years = school_years(&grades);
        if years.is_empty() {
            return Ok(Transition::quick_replies(messages::NO_GRADES, replies::back()));
        }

        let mut text = String::from(
            "📚 *View Grades by School Year*\n\nPlease select a school year to view grades:\n\n",
        );
        for (i, year) in years.iter().enumerate() {
            let _ = writeln!(text, "[{}] {year}", i + 1);
        }

        let delta =
            SessionData::new().with_school_years(State::ViewGrades, SelectionMap::numbered(years));
        Ok(Transition::enter_with(State::ViewGrades, delta)
            .with_quick_replies(text, replies::back()))
    }

    /// One message per semester of `year`; enters `ViewGradesDetail`.
    pub async fn grades_for_year(&self, psid: &str, year: &str) -> Result<Transition> {
        let active = match self.active_student(psid).await? {
            Ok(active) => active,
            Err(denied) => return Ok(denied),
        };
        let grades = self
            .repos
            .grades
            .grades_by_year(
                &active.student.school.school_id,
                &active.student.student_id,
                year,
            )
            .await?;

        let transition = Transition::enter(State::ViewGradesDetail);
        if grades.is_empty() {
            return Ok(transition
                .with_quick_replies(messages::no_grades_for_year(year), replies::back()));
        }

        let mut by_semester: BTreeMap<&str, Vec<&SubjectGrade>> = BTreeMap::new();
        for grade in &grades {
            by_semester.entry(grade.semester.as_str()).or_default().push(grade);
        }

        let mut transition = transition;
        for (semester, mut items) in by_semester {
            items.sort_by(|a, b| a.subject_description.cmp(&b.subject_description));
            let mut text = format!("📚 *{semester} - {year}*\n\n");
            for grade in items {
                text.push_str(&messages::grade_item(
                    &grade.subject_description,
                    &grade.student_grade,
                    &grade.exam_term,
                ));
            }
            transition = transition.with_text(text);
        }
        Ok(transition.with_quick_replies(messages::SELECT_ANOTHER_OPTION, replies::back()))
    }

    /// Profile details with the subjects / switch options; enters `ProfileMenu`.
    pub async fn profile_menu(&self, psid: &str) -> Result<Transition> {
        let active = match self.active_student(psid).await? {
            Ok(active) => active,
            Err(denied) => return Ok(denied),
        };
        Ok(Transition::enter(State::ProfileMenu).with_quick_replies(
            messages::profile_details(&active.student, active.link.is_active),
            replies::back(),
        ))
    }

    pub fn confirm_switch(&self) -> Transition {
        Transition::enter(State::ConfirmProfileSwitch)
            .with_quick_replies(messages::CONFIRM_SWITCH, replies::confirm_switch())
    }

    /// School-year chooser for enrolled subjects; enters `SelectSubject`.
    pub async fn subject_years(&self, psid: &str) -> Result<Transition> {
        let active = match self.active_student(psid).await? {
            Ok(active) => active,
            Err(denied) => return Ok(denied),
        };
        let subjects = self
            .repos
            .grades
            .grades(&active.student.school.school_id, &active.student.student_id)
            .await?;

        let years = school_years(&subjects);
        let text = if years.is_empty() {
            messages::NO_SUBJECTS.to_string()
        } else {
            let mut text = String::from(
                "*View Subjects by School Year*\n\nPlease select a school year to view subjects:\n\n",
            );
            for (i, year) in years.iter().enumerate() {
                let _ = writeln!(text, "[{}] {year}", i + 1);
            }
            text
        };

        let delta = SessionData::new()
            .with_school_years(State::SelectSubject, SelectionMap::numbered(years));
        Ok(Transition::enter_with(State::SelectSubject, delta)
            .with_quick_replies(text, replies::back()))
    }

    /// Enrolled subjects of `year`; enters `ViewSubjects` keeping the year map.
    pub async fn subjects_for_year(&self, psid: &str, year: &str) -> Result<Transition> {
        let active = match self.active_student(psid).await? {
            Ok(active) => active,
            Err(denied) => return Ok(denied),
        };
        let student = &active.student;
        let subjects = self
            .repos
            .grades
            .grades_by_year(&student.school.school_id, &student.student_id, year)
            .await?;

        let mut text = format!(
            "📚 *Subjects for School Year {year}*\n\n*Name:* {} {}\n*School:* {}\n*Course:* {}\n\n",
            student.first_name, student.last_name, student.school.school_name, student.course
        );
        if subjects.is_empty() {
            text.push_str("No subjects found for this school year.");
        }
        for subject in &subjects {
            let _ = write!(
                text,
                "• *{}*\n   Subject Unit: {}\n   Schedule: {}\n   Room: {}\n\n",
                subject.subject_description,
                subject.subject_unit,
                subject.subject_schedule,
                subject.subject_room
            );
        }

        Ok(Transition::enter(State::ViewSubjects).with_quick_replies(text, replies::back()))
    }
}
