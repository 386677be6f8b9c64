//! Dataset loading for the evaluation.
//!
//! Supports:
//! - SQuAD v1.1 / v2.0 JSON (`data[].paragraphs[].qas[]`)
//! - A directory of SQuAD JSON files, merged in path order
//! - A small built-in sample for smoke runs

use crate::error::{EvalError, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fs;
use std::path::Path;
use walkdir::WalkDir;

/// A question with its accepted answers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QuestionAnswer {
    pub question: String,
    /// Trimmed, deduplicated, never empty strings.
    pub reference_answers: BTreeSet<String>,
    /// The paragraph does not answer the question.
    pub impossible: bool,
}

impl QuestionAnswer {
    pub fn new<I, S>(question: impl Into<String>, answers: I, impossible: bool) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let reference_answers = answers
            .into_iter()
            .map(|answer| answer.as_ref().trim().to_string())
            .filter(|answer| !answer.is_empty())
            .collect();

        Self {
            question: question.into().trim().to_string(),
            reference_answers,
            impossible,
        }
    }
}

/// A context passage and the questions asked about it.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Paragraph {
    pub context: String,
    pub questions: Vec<QuestionAnswer>,
}

/// A titled group of paragraphs.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Document {
    pub title: String,
    pub paragraphs: Vec<Paragraph>,
}

/// A collection of documents.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Dataset {
    pub name: String,
    pub documents: Vec<Document>,
}

impl Dataset {
    /// Create a new empty dataset.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            documents: Vec::new(),
        }
    }

    /// All paragraphs in document order.
    pub fn paragraphs(&self) -> impl Iterator<Item = &Paragraph> {
        self.documents.iter().flat_map(|doc| doc.paragraphs.iter())
    }

    pub fn paragraph_count(&self) -> usize {
        self.documents.iter().map(|doc| doc.paragraphs.len()).sum()
    }

    pub fn question_count(&self) -> usize {
        self.paragraphs().map(|p| p.questions.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.paragraph_count() == 0
    }

    /// Keep only the first `n` paragraphs (for quick runs).
    pub fn take_paragraphs(&self, n: usize) -> Self {
        let mut remaining = n;
        let mut documents = Vec::new();

        for doc in &self.documents {
            if remaining == 0 {
                break;
            }
            let paragraphs: Vec<_> = doc.paragraphs.iter().take(remaining).cloned().collect();
            remaining -= paragraphs.len();
            documents.push(Document {
                title: doc.title.clone(),
                paragraphs,
            });
        }

        Self {
            name: self.name.clone(),
            documents,
        }
    }
}

#[derive(Debug, Deserialize)]
struct SquadFile {
    #[serde(default)]
    version: Option<String>,
    data: Vec<SquadArticle>,
}

#[derive(Debug, Deserialize)]
struct SquadArticle {
    #[serde(default)]
    title: String,
    paragraphs: Vec<SquadParagraph>,
}

#[derive(Debug, Deserialize)]
struct SquadParagraph {
    context: String,
    qas: Vec<SquadQuestion>,
}

#[derive(Debug, Deserialize)]
struct SquadQuestion {
    question: String,
    #[serde(default)]
    answers: Vec<SquadAnswer>,
    #[serde(default)]
    is_impossible: bool,
}

#[derive(Debug, Deserialize)]
struct SquadAnswer {
    text: String,
}

/// Parse a SQuAD JSON document.
pub fn parse_squad(name: &str, content: &str) -> Result<Dataset> {
    let raw: SquadFile = serde_json::from_str(content)
        .map_err(|e| EvalError::Dataset(format!("Failed to parse SQuAD JSON '{}': {}", name, e)))?;

    let name = match raw.version {
        Some(version) => format!("{} (SQuAD {})", name, version),
        None => name.to_string(),
    };

    let documents = raw
        .data
        .into_iter()
        .map(|article| Document {
            title: article.title.trim().to_string(),
            paragraphs: article
                .paragraphs
                .into_iter()
                .map(|paragraph| Paragraph {
                    context: paragraph.context.trim().to_string(),
                    questions: paragraph
                        .qas
                        .into_iter()
                        .map(|qa| {
                            QuestionAnswer::new(
                                qa.question,
                                qa.answers.into_iter().map(|a| a.text),
                                qa.is_impossible,
                            )
                        })
                        .collect(),
                })
                .collect(),
        })
        .collect();

    Ok(Dataset { name, documents })
}

/// Load a SQuAD dataset from a JSON file, or from every `.json` file under a directory.
pub fn load_squad_dataset(path: &Path) -> Result<Dataset> {
    if path.is_dir() {
        return load_squad_directory(path);
    }

    let content = fs::read_to_string(path).map_err(|e| EvalError::io(path, e))?;
    let name = path
        .file_stem()
        .and_then(|s| s.to_str())
        .unwrap_or("squad");
    parse_squad(name, &content)
}

fn load_squad_directory(dir: &Path) -> Result<Dataset> {
    let mut files: Vec<_> = WalkDir::new(dir)
        .into_iter()
        .filter_map(|entry| entry.ok())
        .filter(|entry| entry.file_type().is_file())
        .map(|entry| entry.into_path())
        .filter(|path| path.extension().and_then(|e| e.to_str()) == Some("json"))
        .collect();
    files.sort();

    if files.is_empty() {
        return Err(EvalError::Dataset(format!(
            "No SQuAD JSON files found under '{}'",
            dir.display()
        )));
    }

    let name = dir
        .file_name()
        .and_then(|s| s.to_str())
        .unwrap_or("squad")
        .to_string();
    let mut dataset = Dataset::new(&name);

    for file in files {
        let content = fs::read_to_string(&file).map_err(|e| EvalError::io(&file, e))?;
        let part = parse_squad(&name, &content)?;
        dataset.documents.extend(part.documents);
    }

    Ok(dataset)
}

/// Create a sample dataset for smoke runs.
pub fn create_sample_dataset() -> Dataset {
    let mut dataset = Dataset::new("sample");

    dataset.documents.push(Document {
        title: "Super_Bowl_50".to_string(),
        paragraphs: vec![Paragraph {
            context: "Super Bowl 50 was an American football game to determine the champion of the \
National Football League (NFL) for the 2015 season. The American Football Conference (AFC) \
champion Denver Broncos defeated the National Football Conference (NFC) champion Carolina \
Panthers 24-10 to earn their third Super Bowl title. The game was played on February 7, 2016, \
at Levi's Stadium in the San Francisco Bay Area at Santa Clara, California."
                .to_string(),
            questions: vec![
                QuestionAnswer::new(
                    "Which NFL team won Super Bowl 50?",
                    ["Denver Broncos", "Denver Broncos", "Broncos"],
                    false,
                ),
                QuestionAnswer::new(
                    "Where was Super Bowl 50 played?",
                    ["Santa Clara, California", "Levi's Stadium"],
                    false,
                ),
                QuestionAnswer::new(
                    "Who performed the halftime show of Super Bowl 50?",
                    Vec::<String>::new(),
                    true,
                ),
            ],
        }],
    });

    dataset.documents.push(Document {
        title: "Normans".to_string(),
        paragraphs: vec![Paragraph {
            context: "The Normans were the people who in the 10th and 11th centuries gave their \
name to Normandy, a region in France. They were descended from Norse raiders and pirates from \
Denmark, Iceland and Norway who, under their leader Rollo, agreed to swear fealty to King \
Charles III of West Francia."
                .to_string(),
            questions: vec![
                QuestionAnswer::new(
                    "In what country is Normandy located?",
                    ["France"],
                    false,
                ),
                QuestionAnswer::new(
                    "Who was the leader of the Norse raiders?",
                    ["Rollo"],
                    false,
                ),
            ],
        }],
    });

    dataset
}
