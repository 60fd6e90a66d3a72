//! Add/Edit dialog logic, independent of how the dialog is drawn.

use crate::error::{SaveError, ScrapeError, ValidationError};
use crate::models::{format_date, parse_date, Position};
use crate::scrape::PositionScraper;
use crate::store::PositionStore;

/// Editable fields of a position, in form order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Field {
    Result,
    Company,
    JobTitle,
    JobTitlePdf,
    Location,
    Web,
    Person,
    Phone,
    Email,
    RequestSentDate,
    AnswerDate,
    Conversation,
}

impl Field {
    pub const ALL: [Field; 12] = [
        Field::Result,
        Field::Company,
        Field::JobTitle,
        Field::JobTitlePdf,
        Field::Location,
        Field::Web,
        Field::Person,
        Field::Phone,
        Field::Email,
        Field::RequestSentDate,
        Field::AnswerDate,
        Field::Conversation,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Field::Result => "Result",
            Field::Company => "Company",
            Field::JobTitle => "Job title",
            Field::JobTitlePdf => "PDF",
            Field::Location => "Location",
            Field::Web => "Web",
            Field::Person => "Person",
            Field::Phone => "Phone",
            Field::Email => "Email",
            Field::RequestSentDate => "Request sent",
            Field::AnswerDate => "Answer",
            Field::Conversation => "Conversation",
        }
    }

    /// Message shown in a required field left empty on save.
    fn required_message(self) -> Option<&'static str> {
        match self {
            Field::Company => Some("No valid company name!"),
            Field::JobTitle => Some("No valid job title!"),
            Field::JobTitlePdf => Some("No valid PDF path!"),
            Field::Location => Some("No valid location!"),
            Field::Web => Some("No valid URL!"),
            _ => None,
        }
    }

    /// Placeholder for a field the scraper could not fill.
    fn fill_prompt(self) -> Option<&'static str> {
        match self {
            Field::Company => Some("Can't find company name, fill this field manually"),
            Field::JobTitle => Some("Can't find job title, fill this field manually"),
            Field::Location => Some("Can't find job location, fill this field manually"),
            Field::Person => Some("Can't find contact person, you can fill this field manually"),
            Field::Phone => Some("Can't find phone, you can fill this field manually"),
            Field::Email => Some("Can't find email, you can fill this field manually"),
            Field::Conversation => Some("Here you can type the conversation with the contact person"),
            _ => self.default_prompt(),
        }
    }

    fn default_prompt(self) -> Option<&'static str> {
        match self {
            Field::RequestSentDate | Field::AnswerDate => Some("dd.mm.yyyy"),
            _ => None,
        }
    }

    pub fn is_multiline(self) -> bool {
        self == Field::Conversation
    }

    fn index(self) -> usize {
        self as usize
    }
}

/// Text values of the dialog, one per [`Field`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PositionForm {
    /// `None` until an id is assigned by fill or save.
    pub id: Option<i64>,
    values: [String; 12],
}

impl PositionForm {
    pub fn from_position(position: &Position) -> Self {
        let mut form = Self {
            id: Some(position.id),
            ..Default::default()
        };
        form.set(Field::Result, &position.result);
        form.set(Field::Company, &position.company);
        form.set(Field::JobTitle, &position.job_title);
        form.set(Field::JobTitlePdf, &position.job_title_pdf);
        form.set(Field::Location, &position.location);
        form.set(Field::Web, &position.web);
        form.set(Field::Person, &position.person);
        form.set(Field::Phone, &position.phone);
        form.set(Field::Email, &position.email);
        form.set(Field::RequestSentDate, format_date(position.request_sent_date));
        form.set(Field::AnswerDate, format_date(position.answer_date));
        form.set(Field::Conversation, &position.conversation);
        form
    }

    pub fn value(&self, field: Field) -> &str {
        &self.values[field.index()]
    }

    pub fn value_mut(&mut self, field: Field) -> &mut String {
        &mut self.values[field.index()]
    }

    pub fn set(&mut self, field: Field, value: impl Into<String>) {
        self.values[field.index()] = value.into();
    }

    fn date(&self, field: Field) -> Option<chrono::NaiveDate> {
        let text = self.value(field).trim();
        if text.is_empty() {
            return None;
        }
        let date = parse_date(text);
        if date.is_none() {
            tracing::warn!("Ignoring unparseable {} date '{}'", field.label(), text);
        }
        date
    }

    /// Date fields holding text that is not a date, with that text.
    /// Saving stores them as empty.
    pub fn unparsed_dates(&self) -> Vec<(Field, String)> {
        [Field::RequestSentDate, Field::AnswerDate]
            .into_iter()
            .filter_map(|field| {
                let text = self.value(field).trim();
                (!text.is_empty() && parse_date(text).is_none()).then(|| (field, text.to_string()))
            })
            .collect()
    }

    fn to_position(&self, id: i64) -> Position {
        Position {
            id,
            result: self.value(Field::Result).to_string(),
            company: self.value(Field::Company).to_string(),
            job_title: self.value(Field::JobTitle).to_string(),
            job_title_pdf: self.value(Field::JobTitlePdf).to_string(),
            location: self.value(Field::Location).to_string(),
            web: self.value(Field::Web).to_string(),
            person: self.value(Field::Person).to_string(),
            phone: self.value(Field::Phone).to_string(),
            email: self.value(Field::Email).to_string(),
            request_sent_date: self.date(Field::RequestSentDate),
            answer_date: self.date(Field::AnswerDate),
            conversation: self.value(Field::Conversation).to_string(),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogMode {
    Add,
    Edit,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DialogState {
    Opened,
    Validating,
    Saved,
    Cancelled,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DialogOutcome {
    Confirmed(Position),
    Cancelled,
}

/// What a fill needs: the id the scraped position gets and the URL to fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FillRequest {
    pub id: i64,
    pub url: String,
}

#[derive(Debug)]
pub struct DialogController {
    mode: DialogMode,
    state: DialogState,
    form: PositionForm,
    filled: bool,
    saved: Option<Position>,
}

impl DialogController {
    pub fn open_add() -> Self {
        Self {
            mode: DialogMode::Add,
            state: DialogState::Opened,
            form: PositionForm::default(),
            filled: false,
            saved: None,
        }
    }

    pub fn open_edit(position: &Position) -> Self {
        let mut dialog = Self::open_add();
        dialog.mode = DialogMode::Edit;
        dialog.bind_fields(position);
        dialog
    }

    pub fn mode(&self) -> DialogMode {
        self.mode
    }

    pub fn state(&self) -> DialogState {
        self.state
    }

    pub fn is_open(&self) -> bool {
        matches!(self.state, DialogState::Opened | DialogState::Validating)
    }

    pub fn form(&self) -> &PositionForm {
        &self.form
    }

    pub fn form_mut(&mut self) -> &mut PositionForm {
        &mut self.form
    }

    pub fn bind_fields(&mut self, position: &Position) {
        self.form = PositionForm::from_position(position);
    }

    /// Placeholder for an empty field; fill-specific once a fill was applied.
    pub fn prompt(&self, field: Field) -> Option<&'static str> {
        if self.filled {
            field.fill_prompt()
        } else {
            field.default_prompt()
        }
    }

    /// Scrape targets that are still empty.
    pub fn unfilled_fields(&self) -> Vec<Field> {
        [
            Field::Company,
            Field::JobTitle,
            Field::Location,
            Field::Person,
            Field::Phone,
            Field::Email,
        ]
        .into_iter()
        .filter(|f| self.form.value(*f).trim().is_empty())
        .collect()
    }

    pub fn fill_request(&self, store: &PositionStore) -> FillRequest {
        FillRequest {
            id: self.form.id.unwrap_or_else(|| store.next_id()),
            url: self.form.value(Field::Web).trim().to_string(),
        }
    }

    /// Show a scrape result. Returns false when the dialog already closed.
    pub fn apply_fill(&mut self, position: &Position) -> bool {
        if self.state != DialogState::Opened {
            tracing::debug!("Dropping fill result for closed dialog");
            return false;
        }
        self.bind_fields(position);
        self.filled = true;
        true
    }

    pub fn handle_fill(
        &mut self,
        store: &PositionStore,
        scraper: &PositionScraper,
    ) -> Result<(), ScrapeError> {
        let request = self.fill_request(store);
        let position = scraper.fetch(request.id, &request.url)?;
        self.apply_fill(&position);
        Ok(())
    }

    pub fn validate(&self) -> Result<(), ValidationError> {
        let problems: Vec<String> = Field::ALL
            .into_iter()
            .filter(|f| self.form.value(*f).trim().is_empty())
            .filter_map(|f| f.required_message())
            .map(String::from)
            .collect();

        if problems.is_empty() {
            Ok(())
        } else {
            Err(ValidationError { problems })
        }
    }

    pub fn is_input_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Validate and commit the form into the store.
    pub fn handle_save(&mut self, store: &mut PositionStore) -> Result<Position, SaveError> {
        if self.state != DialogState::Opened {
            return Err(SaveError::Closed);
        }

        self.state = DialogState::Validating;
        if let Err(e) = self.validate() {
            self.state = DialogState::Opened;
            return Err(e.into());
        }

        let id = self.form.id.unwrap_or_else(|| store.next_id());
        let position = self.form.to_position(id);
        let committed = match self.mode {
            DialogMode::Add => store.add(position.clone()),
            DialogMode::Edit => store.update(position.clone()),
        };
        if let Err(e) = committed {
            self.state = DialogState::Opened;
            return Err(e.into());
        }

        tracing::info!("Saved position #{} ({})", id, position.company);
        self.form.id = Some(id);
        self.state = DialogState::Saved;
        self.saved = Some(position.clone());
        Ok(position)
    }

    pub fn handle_cancel(&mut self) {
        if self.is_open() {
            self.state = DialogState::Cancelled;
        }
    }

    /// The dialog's answer once it has closed.
    pub fn outcome(&self) -> Option<DialogOutcome> {
        match self.state {
            DialogState::Saved => self.saved.clone().map(DialogOutcome::Confirmed),
            DialogState::Cancelled => Some(DialogOutcome::Cancelled),
            DialogState::Opened | DialogState::Validating => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StoreError;
    use crate::scrape::tests::{scraper_with, StubFetcher, POSTING_HTML};
    use chrono::NaiveDate;

    fn filled_form(dialog: &mut DialogController) {
        let form = dialog.form_mut();
        form.set(Field::Company, "Acme");
        form.set(Field::JobTitle, "Engineer");
        form.set(Field::JobTitlePdf, "job_descriptions/2024-03-01_Acme_Engineer.pdf");
        form.set(Field::Location, "Prague");
        form.set(Field::Web, "https://jobs.example.com/1");
    }

    fn existing(id: i64) -> Position {
        Position {
            id,
            company: "Globex".to_string(),
            job_title: "Analyst".to_string(),
            job_title_pdf: "job_descriptions/x.pdf".to_string(),
            location: "Brno".to_string(),
            web: "https://globex.example".to_string(),
            conversation: "First call went well".to_string(),
            answer_date: NaiveDate::from_ymd_opt(2024, 5, 6),
            ..Default::default()
        }
    }

    #[test]
    fn test_empty_company_fails_validation() {
        let mut dialog = DialogController::open_add();
        filled_form(&mut dialog);
        dialog.form_mut().set(Field::Company, "");

        let err = dialog.validate().unwrap_err();
        assert_eq!(err.problems, vec!["No valid company name!".to_string()]);
        assert!(err.to_string().contains("company"));
        assert!(!dialog.is_input_valid());
    }

    #[test]
    fn test_validation_aggregates_in_field_order() {
        let dialog = DialogController::open_add();
        let err = dialog.validate().unwrap_err();
        assert_eq!(
            err.problems,
            vec![
                "No valid company name!",
                "No valid job title!",
                "No valid PDF path!",
                "No valid location!",
                "No valid URL!",
            ]
        );
        assert_eq!(err.to_string().lines().count(), 5);
    }

    #[test]
    fn test_whitespace_only_is_empty() {
        let mut dialog = DialogController::open_add();
        filled_form(&mut dialog);
        dialog.form_mut().set(Field::Location, "   ");
        assert_eq!(
            dialog.validate().unwrap_err().problems,
            vec!["No valid location!".to_string()]
        );
    }

    #[test]
    fn test_required_fields_pass_regardless_of_other_content() {
        let mut dialog = DialogController::open_add();
        filled_form(&mut dialog);
        let form = dialog.form_mut();
        form.set(Field::Phone, "call me maybe");
        form.set(Field::Email, "not-an-email");
        form.set(Field::RequestSentDate, "yesterday");
        form.set(Field::AnswerDate, "32.13.2024");

        assert!(dialog.is_input_valid());
    }

    #[test]
    fn test_add_save_assigns_next_id_and_marks_dirty() {
        let mut store = PositionStore::new();
        store.load(vec![existing(3)]);
        let mut dialog = DialogController::open_add();
        filled_form(&mut dialog);
        dialog.form_mut().set(Field::RequestSentDate, "01.03.2024");
        dialog.form_mut().set(Field::AnswerDate, "soon");

        let saved = dialog.handle_save(&mut store).unwrap();

        assert_eq!(saved.id, 4);
        assert_eq!(saved.request_sent_date, NaiveDate::from_ymd_opt(2024, 3, 1));
        assert_eq!(saved.answer_date, None);
        assert!(store.is_dirty());
        assert_eq!(store.get(4), Some(&saved));
        assert_eq!(dialog.state(), DialogState::Saved);
        assert_eq!(dialog.outcome(), Some(DialogOutcome::Confirmed(saved)));
    }

    #[test]
    fn test_unparsed_dates_names_the_dropped_text() {
        let mut dialog = DialogController::open_edit(&existing(1));
        assert!(dialog.form().unparsed_dates().is_empty());

        dialog.form_mut().set(Field::AnswerDate, " 6.5.24 ");
        dialog.form_mut().set(Field::RequestSentDate, "2024-03-01");

        assert_eq!(
            dialog.form().unparsed_dates(),
            vec![(Field::AnswerDate, "6.5.24".to_string())]
        );
    }

    #[test]
    fn test_invalid_save_keeps_dialog_open_and_store_untouched() {
        let mut store = PositionStore::new();
        let mut dialog = DialogController::open_add();

        let err = dialog.handle_save(&mut store).unwrap_err();

        assert!(matches!(err, SaveError::Invalid(_)));
        assert!(store.is_empty());
        assert!(!store.is_dirty());
        assert_eq!(dialog.state(), DialogState::Opened);
        assert_eq!(dialog.outcome(), None);
    }

    #[test]
    fn test_edit_save_updates_in_place() {
        let mut store = PositionStore::new();
        store.load(vec![existing(1), existing(2)]);
        let mut dialog = DialogController::open_edit(store.get(2).unwrap());
        assert_eq!(dialog.form().value(Field::AnswerDate), "06.05.2024");

        dialog.form_mut().set(Field::Result, "offer");
        let saved = dialog.handle_save(&mut store).unwrap();

        assert_eq!(saved.id, 2);
        assert_eq!(store.len(), 2);
        assert_eq!(store.get(2).unwrap().result, "offer");
        assert_eq!(store.get(2).unwrap().answer_date, NaiveDate::from_ymd_opt(2024, 5, 6));
        assert!(store.is_dirty());
    }

    #[test]
    fn test_edit_of_deleted_position_reports_store_error() {
        let mut store = PositionStore::new();
        store.load(vec![existing(1)]);
        let mut dialog = DialogController::open_edit(&existing(1));
        store.remove(1);

        let err = dialog.handle_save(&mut store).unwrap_err();
        assert!(matches!(err, SaveError::Store(StoreError::UnknownId(1))));
        assert!(dialog.is_open());
    }

    #[test]
    fn test_save_after_close_is_rejected() {
        let mut store = PositionStore::new();
        let mut dialog = DialogController::open_add();
        filled_form(&mut dialog);
        dialog.handle_cancel();

        assert!(matches!(dialog.handle_save(&mut store), Err(SaveError::Closed)));
        assert!(store.is_empty());
    }

    #[test]
    fn test_cancel_discards_edits() {
        let mut store = PositionStore::new();
        store.load(vec![existing(1)]);
        let mut dialog = DialogController::open_edit(store.get(1).unwrap());
        dialog.form_mut().set(Field::Company, "Changed");

        dialog.handle_cancel();

        assert_eq!(dialog.outcome(), Some(DialogOutcome::Cancelled));
        assert_eq!(store.get(1).unwrap().company, "Globex");
        assert!(!store.is_dirty());
    }

    #[test]
    fn test_fill_request_resolves_id() {
        let mut store = PositionStore::new();
        store.load(vec![existing(7)]);

        let mut add = DialogController::open_add();
        add.form_mut().set(Field::Web, " https://jobs.example.com/9 ");
        assert_eq!(
            add.fill_request(&store),
            FillRequest {
                id: 8,
                url: "https://jobs.example.com/9".to_string()
            }
        );

        let edit = DialogController::open_edit(store.get(7).unwrap());
        assert_eq!(edit.fill_request(&store).id, 7);
    }

    #[test]
    fn test_id_zero_is_a_real_id() {
        let mut store = PositionStore::new();
        store.load(vec![existing(0), existing(5)]);
        let edit = DialogController::open_edit(store.get(0).unwrap());
        assert_eq!(edit.fill_request(&store).id, 0);
    }

    #[test]
    fn test_handle_fill_populates_form_and_prompts() {
        let store = PositionStore::new();
        let scraper = scraper_with(StubFetcher::serving(POSTING_HTML));
        let mut dialog = DialogController::open_add();
        dialog.form_mut().set(Field::Web, "https://jobs.example.com/rust");
        assert_eq!(dialog.prompt(Field::Company), None);

        dialog.handle_fill(&store, &scraper).unwrap();

        let form = dialog.form();
        assert_eq!(form.id, Some(1));
        assert_eq!(form.value(Field::Company), "Acme s.r.o.");
        assert_eq!(form.value(Field::Location), "Praha");
        assert_eq!(form.value(Field::Web), "https://jobs.example.com/rust");
        assert!(form.value(Field::JobTitlePdf).ends_with("_Acme s.r.o._Rust Engineer.pdf"));
        assert!(dialog.unfilled_fields().is_empty());
        assert!(dialog.prompt(Field::Company).unwrap().contains("company"));
        assert_eq!(dialog.prompt(Field::AnswerDate), Some("dd.mm.yyyy"));
    }

    #[test]
    fn test_failed_fill_leaves_form_unchanged() {
        let store = PositionStore::new();
        let scraper = scraper_with(StubFetcher::failing());
        let mut dialog = DialogController::open_add();
        dialog.form_mut().set(Field::Web, "https://example.com/gone");
        dialog.form_mut().set(Field::Company, "Typed by hand");
        let before = dialog.form().clone();

        assert!(dialog.handle_fill(&store, &scraper).is_err());
        assert_eq!(dialog.form(), &before);
        assert!(dialog.is_open());
    }

    #[test]
    fn test_late_fill_after_cancel_is_dropped() {
        let mut dialog = DialogController::open_add();
        dialog.handle_cancel();

        let mut scraped = existing(1);
        scraped.company = "Late".to_string();
        assert!(!dialog.apply_fill(&scraped));
        assert_eq!(dialog.form().value(Field::Company), "");
        assert_eq!(dialog.outcome(), Some(DialogOutcome::Cancelled));
    }

    #[test]
    fn test_unfilled_fields_lists_empty_scrape_targets() {
        let mut dialog = DialogController::open_add();
        let mut scraped = Position::new(1);
        scraped.company = "Acme".to_string();
        scraped.job_title = "Engineer".to_string();
        dialog.apply_fill(&scraped);

        assert_eq!(
            dialog.unfilled_fields(),
            vec![Field::Location, Field::Person, Field::Phone, Field::Email]
        );
    }
}
