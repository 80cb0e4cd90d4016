use crate::api::{ApiError, NewPost, Post};
use crate::collection::PostCollection;
use crate::mutation::MutationJob;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Field {
    Title,
    Tag,
    Date,
    Teaser,
    Content,
}

impl Field {
    pub const ALL: [Field; 5] = [
        Field::Title,
        Field::Tag,
        Field::Date,
        Field::Teaser,
        Field::Content,
    ];

    pub fn label(self) -> &'static str {
        match self {
            Field::Title => "Title",
            Field::Tag => "Tag",
            Field::Date => "Date",
            Field::Teaser => "Teaser",
            Field::Content => "Content",
        }
    }

    pub fn is_multiline(self) -> bool {
        matches!(self, Field::Content)
    }

    fn position(self) -> usize {
        Field::ALL
            .iter()
            .position(|field| *field == self)
            .unwrap_or(0)
    }

    pub fn next(self) -> Self {
        Field::ALL[(self.position() + 1) % Field::ALL.len()]
    }

    pub fn prev(self) -> Self {
        let len = Field::ALL.len();
        Field::ALL[(self.position() + len - 1) % len]
    }
}

/// Admin edit form. `id` is set only when an existing post was loaded, which
/// turns the submit into an update.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EditForm {
    pub id: Option<String>,
    pub title: String,
    pub tag: String,
    pub date: String,
    pub teaser: String,
    pub content: String,
    pub focus: Field,
}

impl Default for EditForm {
    fn default() -> Self {
        Self {
            id: None,
            title: String::new(),
            tag: String::new(),
            date: String::new(),
            teaser: String::new(),
            content: String::new(),
            focus: Field::Title,
        }
    }
}

impl EditForm {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn load(&mut self, post: &Post) {
        self.id = Some(post.id.clone());
        self.title = post.title.clone();
        self.tag = post.tag.clone();
        self.date = post.date.clone();
        self.teaser = post.teaser.clone();
        self.content = post.content.clone();
        self.focus = Field::Title;
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn is_update(&self) -> bool {
        self.id.is_some()
    }

    pub fn submit_label(&self) -> &'static str {
        if self.is_update() {
            "Update"
        } else {
            "Publish"
        }
    }

    pub fn value(&self, field: Field) -> &str {
        match field {
            Field::Title => &self.title,
            Field::Tag => &self.tag,
            Field::Date => &self.date,
            Field::Teaser => &self.teaser,
            Field::Content => &self.content,
        }
    }

    fn value_mut(&mut self, field: Field) -> &mut String {
        match field {
            Field::Title => &mut self.title,
            Field::Tag => &mut self.tag,
            Field::Date => &mut self.date,
            Field::Teaser => &mut self.teaser,
            Field::Content => &mut self.content,
        }
    }

    pub fn insert_char(&mut self, ch: char) {
        let focus = self.focus;
        self.value_mut(focus).push(ch);
    }

    pub fn newline(&mut self) {
        if self.focus.is_multiline() {
            self.content.push('\n');
        } else {
            self.focus = self.focus.next();
        }
    }

    pub fn backspace(&mut self) {
        let focus = self.focus;
        self.value_mut(focus).pop();
    }

    pub fn focus_next(&mut self) {
        self.focus = self.focus.next();
    }

    pub fn focus_prev(&mut self) {
        self.focus = self.focus.prev();
    }

    /// Client-side checks, then the job to enqueue. The form itself is left
    /// untouched so a failed submit can be retried.
    pub fn to_job(&self, collection: &PostCollection) -> Result<MutationJob, ApiError> {
        if self.title.trim().is_empty() || self.content.trim().is_empty() {
            return Err(ApiError::Validation("title and content are required".into()));
        }
        if let Some(existing) = collection.tag_conflict(&self.tag, self.id.as_deref()) {
            return Err(ApiError::Conflict(format!(
                "tag {} is already used by \"{}\"",
                existing.tag, existing.title
            )));
        }

        let draft = NewPost {
            tag: self.tag.trim().to_string(),
            date: self.date.trim().to_string(),
            title: self.title.trim().to_string(),
            teaser: self.teaser.trim().to_string(),
            content: self.content.clone(),
        };
        Ok(match &self.id {
            Some(id) => MutationJob::Update(draft.with_id(id.clone())),
            None => MutationJob::Create(draft),
        })
    }
}

/// The admin passkey, held in memory for the session only.
#[derive(Debug, Clone, Default)]
pub struct AdminSession {
    passkey: Option<String>,
}

impl AdminSession {
    pub fn unlock(&mut self, passkey: &str) -> Result<(), ApiError> {
        let passkey = passkey.trim();
        if passkey.is_empty() {
            return Err(ApiError::Validation("passkey required".into()));
        }
        self.passkey = Some(passkey.to_string());
        Ok(())
    }

    pub fn lock(&mut self) {
        self.passkey = None;
    }

    pub fn is_unlocked(&self) -> bool {
        self.passkey.is_some()
    }

    pub fn passkey(&self) -> Option<&str> {
        self.passkey.as_deref()
    }
}
