//! Fixed reply texts and the templates filled in by the handlers.

use crate::domain::StudentProfile;

pub const WELCOME: &str = "Welcome to School Assistant!\n\n\
I'm your all-in-one academic and financial assistant. From checking grades to managing tuition, \
I'm here to help you stay on top of your school responsibilities.";

pub const ACCOUNT_DEACTIVATED: &str =
    "Your account has been deactivated. Kindly contact your school admin for assistance.";

pub const ABOUT_US: &str = "𝗔𝗯𝗼𝘂𝘁 𝗢𝘂𝗿 𝗦𝗰𝗵𝗼𝗼𝗹 𝗔𝘀𝘀𝗶𝘀𝘁𝗮𝗻𝘁 🎓\n\n\
School Assistant is your all-in-one academic and financial assistant for student life.\n\n\
From checking grades to managing tuition, this chatbot helps you stay on top of your school \
responsibilities, right here in Messenger.\n\n\
What You Can Do with School Assistant:\n\
• 📚 Check your grades – View your academic performance anytime.\n\
• 💳 Manage school fees – Track balances, due dates, and settle payments easily.\n\
• 📢 View announcements – Stay informed about events, updates, and important deadlines.\n\
• 🤝 Get support – Need help with anything school-related? Just ask.\n\n\
Need assistance? I'm always here to help you out.";

pub const TALK_TO_HUMAN: &str = "🛠️ 𝗧𝗮𝗹𝗸 𝘁𝗼 𝗮 𝗛𝘂𝗺𝗮𝗻\n\n\
For direct assistance, please reach out to us through the following channels. Our team is ready to help!\n\n\
📞 **Phone:**\n(032) 123-4567\n\n\
📧 **Email:**\nsales@goodkredit.com\n\n\
🏢 **Office Hours:**\nMonday - Friday\n8:00 AM - 5:00 PM PHT";

pub const WELCOME_ABOARD: &str = "🎉 Welcome Aboard! 🎉\n\n\
Your School Assistant is now ready to help you with:\n\
• Viewing your grades and academic progress\n\
• Managing school fees and payments\n\
• Staying updated with school announcements\n\
• Tracking your attendance\n\n\
What would you like to do first?";

pub const REGISTERED: &str = "Congratulations! You are now registered to School Assistant";
pub const REGISTRATION_FAILED: &str =
    "Sorry, we couldn't complete your registration. Please try again.";
pub const ACCOUNT_CODE_HEADER: &str = "Your School Assistant ID:";

pub const NO_LINKED_ACCOUNTS: &str = "You don't have any linked accounts yet.";
pub const SELECT_PROFILE: &str = "Select a profile to switch to:";
pub const SINGLE_PROFILE_ONLY: &str =
    "You only have one linked profile. Contact your school admin to link more profiles.";
pub const DECLINED: &str =
    "No problem! You can always access your profile later by typing 'View Profile'.";
pub const NOT_UNDERSTOOD: &str = "I'm not sure I understand. Here are the available options:";
pub const HOW_CAN_I_HELP: &str = "How can I help you today?";
pub const NO_ACTIVE_PROFILE: &str =
    "No active profile found. Please select a View Profiles and choose a profile to continue.";
pub const STUDENT_NOT_FOUND: &str =
    "Sorry, we couldn't find the student record for your active profile. \
Please contact your school admin.";

pub const INVALID_SELECTION: &str = "Invalid selection. Please try again.";
pub const INVALID_MENU_OPTION: &str =
    "⚠️ Invalid selection. Please choose a valid option from the menu.";
pub const INVALID_PROFILE_OPTION: &str = "⚠️ Invalid selection. Please choose a valid option.";
pub const INVALID_SCHOOL_YEAR: &str =
    " Invalid selection. Please choose a valid school year from the options above.";
pub const INVALID_GRADES_DETAIL: &str =
    "Invalid selection. Go back to view grades by School Year.";
pub const INVALID_LIST: &str = " Invalid selection. Go back to main menu or view more.";
pub const INVALID_PAYABLES: &str =
    "Invalid selection. Go back to main menu or view payment logs.";
pub const INVALID_CONFIRM_SWITCH: &str =
    "Invalid selection. Go back to profile menu or proceed.";
pub const INVALID_TICKET: &str =
    "Invalid selection. Please choose a valid ticket from the options above.";

pub const NO_GRADES: &str = "No grades found for this student.";
pub const SELECT_ANOTHER_OPTION: &str = "Select another option:";
pub const NO_BULLETINS: &str = "No active bulletins found.";
pub const NO_ATTENDANCE: &str = "No attendance records found.";
pub const NO_PAYABLES: &str = "You don't have any active payables at the moment.";
pub const NO_PAYMENT_LOGS: &str = "You don't have any payment history at the moment.";
pub const WHAT_NEXT: &str = "What would you like to do next?";
pub const NO_SUBJECTS: &str = "*No enrolled subjects found.*";
pub const CONFIRM_SWITCH: &str = "Please confirm you want to switch accounts.";

pub const ASK_SUPPORT: &str =
    "You may now type your inquiry message below or view your support tickets.";
pub const SUPPORT_MESSAGE_SENT: &str =
    "✅ Your message has been sent. Our support team will respond as soon as possible.";
pub const NO_TICKETS: &str = "You don't have any support tickets yet.";
pub const TICKET_NOT_FOUND: &str = "Could not find the selected ticket. Please try again.";

pub fn link_instructions(code: &str) -> String {
    format!(
        "📝 𝗟𝗶𝗻𝗸 𝗮 𝗦𝘁𝘂𝗱𝗲𝗻𝘁 𝗔𝗰𝗰𝗼𝘂𝗻𝘁🧑‍🎓\n\n\
Please contact your school administrator and share this unique code:\n\n\
🔑 Your Account Code: {code}\n\n\
🧭 Once linked, you'll be able to view your grades, manage school fees, and more."
    )
}

pub fn primary_profile(student: &StudentProfile) -> String {
    format!(
        "👤 *{} {}* is currently your active profile.\n\n\
Student ID: {}\n\
School: {}\n\n\
Would you like to continue with this profile or switch to another?",
        student.first_name, student.last_name, student.student_id, student.school.school_name
    )
}

pub fn single_profile_confirmation(student: &StudentProfile) -> String {
    format!(
        "I found this profile linked to your account:\n\n\
👤 Name: {} {}\n\
📚 Student ID: {}\n\
🏫 School: {}\n\n\
Would you like to continue with this profile?",
        student.first_name, student.last_name, student.student_id, student.school.school_name
    )
}

pub fn profile_confirmed(student: &StudentProfile) -> String {
    format!(
        "✅ Your active profile has been set to:\n\n👤 *{} {}*\nStudent ID: {}\nSchool: {}",
        student.first_name, student.last_name, student.student_id, student.school.school_name
    )
}

pub fn profile_switched(student: &StudentProfile) -> String {
    format!(
        "✅ Successfully switched to {} {}'s profile.",
        student.first_name, student.last_name
    )
}

pub fn main_menu(student: &StudentProfile) -> String {
    format!(
        "🏫 𝗠𝗮𝗶𝗻 𝗠𝗲𝗻𝘂\n\n\
Student: {}\n\
School: {}\n\n\
Please choose an option:\n\
[1] Check Grades\n\
[2] School Fees\n\
[3] School Bulletin\n\
[4] View Attendance\n\
[5] Manage Account\n\
[6] Support",
        student.full_name(),
        student.school.school_name
    )
}

pub fn profile_details(student: &StudentProfile, active: bool) -> String {
    format!(
        "📋Profile Details\n\n\
Name: {}\n\
Course: {}\n\
Year Level: {}\n\
Status: {}\n\n\
Please choose an option:\n\
[1] Subjects Enrolled\n\
[2] Switch Profile\n",
        student.full_name(),
        student.course,
        student.year_level,
        if active { "Active" } else { "Inactive" }
    )
}

pub fn grade_item(description: &str, grade: &str, term: &str) -> String {
    format!("• {description} | {grade} | {term}\n")
}

pub fn no_grades_for_year(year: &str) -> String {
    format!("No grades found for school year {year}.")
}

pub fn ticket_created(thread_id: &str) -> String {
    format!("✅ Support ticket #{thread_id} has been created.")
}
