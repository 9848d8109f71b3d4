/// Free-form payload attached to a step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StepArgument {
    Scalar(String),
    /// Rows of cells, header row included.
    Table(Vec<Vec<String>>),
    /// Multi-line document string.
    Document(String),
}

impl StepArgument {
    /// Text of a document or scalar argument.
    pub fn text(&self) -> Option<&str> {
        match self {
            StepArgument::Scalar(text) | StepArgument::Document(text) => Some(text),
            StepArgument::Table(_) => None,
        }
    }

    pub fn rows(&self) -> Option<&[Vec<String>]> {
        match self {
            StepArgument::Table(rows) => Some(rows),
            _ => None,
        }
    }
}

impl From<&str> for StepArgument {
    fn from(text: &str) -> Self {
        StepArgument::Document(text.to_string())
    }
}

impl From<Vec<Vec<String>>> for StepArgument {
    fn from(rows: Vec<Vec<String>>) -> Self {
        StepArgument::Table(rows)
    }
}
