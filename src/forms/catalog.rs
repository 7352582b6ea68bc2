use super::{Control, FieldDescriptor, FieldValue, Form, Rule, SelectOption, SkeletonRender, ValueKind};
use crate::models::Gender;

pub const PATIENT_FORM: &str = "patient";
pub const REGISTER_FORM: &str = "register";
pub const APPOINTMENT_CREATE_FORM: &str = "appointment-create";
pub const APPOINTMENT_SCHEDULE_FORM: &str = "appointment-schedule";
pub const APPOINTMENT_CANCEL_FORM: &str = "appointment-cancel";

pub const IDENTIFICATION_DOCUMENT_FIELD: &str = "identificationDocument";

pub const SCHEDULE_DATE_FORMAT: &str = "MM/dd/yyyy  -  h:mm aa";

pub struct Physician {
    pub name: &'static str,
    pub image: &'static str,
}

pub const PHYSICIANS: &[Physician] = &[
    Physician { name: "John Green", image: "/assets/images/dr-green.png" },
    Physician { name: "Leila Cameron", image: "/assets/images/dr-cameron.png" },
    Physician { name: "David Livingston", image: "/assets/images/dr-livingston.png" },
    Physician { name: "Evan Peter", image: "/assets/images/dr-peter.png" },
    Physician { name: "Jane Powell", image: "/assets/images/dr-powell.png" },
    Physician { name: "Alex Ramirez", image: "/assets/images/dr-remirez.png" },
    Physician { name: "Jasmine Lee", image: "/assets/images/dr-lee.png" },
    Physician { name: "Alyana Cruz", image: "/assets/images/dr-cruz.png" },
    Physician { name: "Hardik Sharma", image: "/assets/images/dr-sharma.png" },
];

pub const IDENTIFICATION_TYPES: &[&str] = &[
    "Birth Certificate",
    "Driver's License",
    "Medical Insurance Card/Policy",
    "Military ID Card",
    "National Identity Card",
    "Passport",
    "Resident Alien Card (Green Card)",
    "Social Security Card",
    "State ID Card",
    "Student ID Card",
    "Voter ID Card",
];

/// Appointment forms share fields; the variant decides which apply and which are required.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AppointmentForm {
    Create,
    Schedule,
    Cancel,
}

impl AppointmentForm {
    pub fn form_name(&self) -> &'static str {
        match self {
            AppointmentForm::Create => APPOINTMENT_CREATE_FORM,
            AppointmentForm::Schedule => APPOINTMENT_SCHEDULE_FORM,
            AppointmentForm::Cancel => APPOINTMENT_CANCEL_FORM,
        }
    }
}

pub fn by_name(name: &str) -> Option<Form> {
    match name {
        PATIENT_FORM => Some(patient_form()),
        REGISTER_FORM => Some(register_form()),
        APPOINTMENT_CREATE_FORM => Some(appointment_form(AppointmentForm::Create)),
        APPOINTMENT_SCHEDULE_FORM => Some(appointment_form(AppointmentForm::Schedule)),
        APPOINTMENT_CANCEL_FORM => Some(appointment_form(AppointmentForm::Cancel)),
        _ => None,
    }
}

fn physician_options() -> Vec<SelectOption> {
    PHYSICIANS
        .iter()
        .map(|doctor| SelectOption::new(doctor.name, doctor.name).with_image(doctor.image))
        .collect()
}

fn physician_field() -> FieldDescriptor {
    FieldDescriptor::select("primaryPhysician", physician_options())
        .label("Doctor")
        .placeholder("Select a doctor")
        .rule(Rule::required())
        .rule(Rule::min_length(2, "Select at least one doctor"))
}

fn name_field() -> FieldDescriptor {
    FieldDescriptor::input("name")
        .label("Full name")
        .placeholder("John Doe")
        .icon("/assets/icons/user.svg", "user")
        .rule(Rule::required())
        .rule(Rule::min_length(2, "Name must be at least 2 characters"))
        .rule(Rule::max_length(50, "Name must be at most 50 characters"))
}

fn email_field() -> FieldDescriptor {
    FieldDescriptor::input("email")
        .label("Email")
        .placeholder("johndoe@gmail.com")
        .icon("/assets/icons/email.svg", "email")
        .rule(Rule::required())
        .rule(Rule::email())
}

fn phone_field() -> FieldDescriptor {
    FieldDescriptor::phone("phone")
        .label("Phone number")
        .placeholder("(555) 123-4567")
        .rule(Rule::required())
        .rule(Rule::phone())
}

fn gender_field() -> FieldDescriptor {
    let values: Vec<&str> = Gender::ALL.iter().map(Gender::as_str).collect();
    let render = SkeletonRender::new(ValueKind::Text, |_, value| Control::RadioGroup {
        options: Gender::ALL
            .iter()
            .map(|g| SelectOption::new(g.as_str(), g.label()))
            .collect(),
        selected: value.and_then(FieldValue::as_text).map(str::to_string),
    });
    FieldDescriptor::skeleton("gender", render)
        .label("Gender")
        .rule(Rule::required())
        .rule(Rule::one_of(&values, "Select a gender"))
}

fn identification_document_field() -> FieldDescriptor {
    let render = SkeletonRender::new(ValueKind::Files, |_, value| Control::FileUpload {
        files: match value {
            Some(FieldValue::Files(files)) => files.iter().map(|f| f.file_name.clone()).collect(),
            _ => Vec::new(),
        },
    });
    FieldDescriptor::skeleton(IDENTIFICATION_DOCUMENT_FIELD, render)
        .label("Scanned copy of identification document")
}

/// First intake step: who is booking.
pub fn patient_form() -> Form {
    Form::new(PATIENT_FORM, vec![name_field(), email_field(), phone_field()])
}

pub fn register_form() -> Form {
    let identification_options = IDENTIFICATION_TYPES
        .iter()
        .map(|t| SelectOption::new(t, t))
        .collect();

    Form::new(
        REGISTER_FORM,
        vec![
            name_field(),
            email_field(),
            phone_field(),
            FieldDescriptor::date_picker("birthDate", false, "MM/dd/yyyy")
                .label("Date of birth")
                .rule(Rule::required()),
            gender_field(),
            FieldDescriptor::input("address")
                .label("Address")
                .placeholder("14th Street, New York")
                .rule(Rule::required())
                .rule(Rule::min_length(5, "Address must be at least 5 characters"))
                .rule(Rule::max_length(500, "Address must be at most 500 characters")),
            FieldDescriptor::input("occupation")
                .label("Occupation")
                .placeholder("Software Engineer")
                .rule(Rule::required())
                .rule(Rule::min_length(2, "Occupation must be at least 2 characters"))
                .rule(Rule::max_length(500, "Occupation must be at most 500 characters")),
            FieldDescriptor::input("emergencyContactName")
                .label("Emergency contact name")
                .placeholder("Guardian's name")
                .rule(Rule::required())
                .rule(Rule::min_length(2, "Contact name must be at least 2 characters"))
                .rule(Rule::max_length(50, "Contact name must be at most 50 characters")),
            FieldDescriptor::phone("emergencyContactNumber")
                .label("Emergency contact number")
                .placeholder("(555) 123-4567")
                .rule(Rule::required())
                .rule(Rule::phone()),
            physician_field().label("Primary care physician"),
            FieldDescriptor::input("insuranceProvider")
                .label("Insurance provider")
                .placeholder("BlueCross BlueShield")
                .rule(Rule::required())
                .rule(Rule::min_length(2, "Insurance name must be at least 2 characters"))
                .rule(Rule::max_length(50, "Insurance name must be at most 50 characters")),
            FieldDescriptor::input("insurancePolicyNumber")
                .label("Insurance policy number")
                .placeholder("ABC123456789")
                .rule(Rule::required())
                .rule(Rule::min_length(2, "Policy number must be at least 2 characters"))
                .rule(Rule::max_length(50, "Policy number must be at most 50 characters")),
            FieldDescriptor::textarea("allergies")
                .label("Allergies (if any)")
                .placeholder("Peanuts, Penicillin, Pollen"),
            FieldDescriptor::textarea("currentMedication")
                .label("Current medications")
                .placeholder("Ibuprofen 200mg, Levothyroxine 50mcg"),
            FieldDescriptor::textarea("familyMedicalHistory")
                .label("Family medical history (if relevant)")
                .placeholder("Mother had brain cancer, Father has hypertension"),
            FieldDescriptor::textarea("pastMedicalHistory")
                .label("Past medical history")
                .placeholder("Appendectomy in 2015, Asthma diagnosis in childhood"),
            FieldDescriptor::select("identificationType", identification_options)
                .label("Identification type")
                .placeholder("Select identification type"),
            FieldDescriptor::input("identificationNumber")
                .label("Identification number")
                .placeholder("123456789"),
            identification_document_field(),
            FieldDescriptor::checkbox("treatmentConsent")
                .label("I consent to receive treatment for my health condition.")
                .rule(Rule::accepted("You must consent to treatment in order to proceed")),
            FieldDescriptor::checkbox("disclosureConsent")
                .label("I consent to the use and disclosure of my health information for treatment purposes.")
                .rule(Rule::accepted("You must consent to disclosure in order to proceed")),
            FieldDescriptor::checkbox("privacyConsent")
                .label("I acknowledge that I have reviewed and agree to the privacy policy")
                .rule(Rule::accepted("You must consent to privacy in order to proceed")),
        ],
    )
}

pub fn appointment_form(kind: AppointmentForm) -> Form {
    let mut fields = Vec::new();

    if kind != AppointmentForm::Cancel {
        fields.push(physician_field());
        fields.push(
            FieldDescriptor::date_picker("schedule", true, SCHEDULE_DATE_FORMAT)
                .label("Expected appointment date")
                .rule(Rule::required()),
        );
        let reason = FieldDescriptor::textarea("reason")
            .label("Appointment reason")
            .placeholder("Annual monthly check-up")
            .rule(Rule::max_length(500, "Reason must be at most 500 characters"));
        fields.push(match kind {
            AppointmentForm::Create => reason
                .rule(Rule::required())
                .rule(Rule::min_length(2, "Reason must be at least 2 characters")),
            _ => reason,
        });
        fields.push(
            FieldDescriptor::textarea("note")
                .label("Comments/notes")
                .placeholder("Prefer afternoon appointments, if possible"),
        );
    } else {
        fields.push(
            FieldDescriptor::textarea("cancellationReason")
                .label("Reason for cancellation")
                .placeholder("Urgent meeting came up")
                .rule(Rule::required())
                .rule(Rule::min_length(2, "Reason must be at least 2 characters"))
                .rule(Rule::max_length(500, "Reason must be at most 500 characters")),
        );
    }

    Form::new(kind.form_name(), fields)
}
