//! Prompt text and navigation words.

use crate::options::WizardOptions;

pub(crate) const BACK_HINT: &str = "Type `back` to go to the previous step";
pub(crate) const SKIP_HINT: &str = "Type `skip` to skip this step";
pub(crate) const CANCEL_HINT: &str = "Type `cancel` to abort";

/// A reply that steers the run instead of answering the step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NavWord {
    Back,
    Skip,
    Cancel,
}

impl NavWord {
    /// Classify a reply. Words only count when the matching navigation is
    /// allowed; `back` additionally needs an accepted step to return to.
    pub fn classify(reply: &str, options: &WizardOptions, has_history: bool) -> Option<Self> {
        let word = reply.trim().to_lowercase();
        match word.as_str() {
            "cancel" if options.allow_cancel => Some(Self::Cancel),
            "back" if options.allow_back && has_history => Some(Self::Back),
            "skip" if options.allow_skip => Some(Self::Skip),
            _ => None,
        }
    }
}

/// `{current}`, `{total}` and `{percent}` substituted for step `index`.
pub fn progress_banner(format: &str, index: usize, total: usize) -> String {
    let current = index + 1;
    let percent = if total == 0 {
        100
    } else {
        ((current as f64 / total as f64) * 100.0).round() as u64
    };
    format
        .replace("{current}", &current.to_string())
        .replace("{total}", &total.to_string())
        .replace("{percent}", &percent.to_string())
}

/// Navigation hints, or `None` when nothing is enabled.
pub fn navigation_hints(options: &WizardOptions, has_history: bool) -> Option<String> {
    let mut hints = Vec::new();
    if options.allow_back && has_history {
        hints.push(BACK_HINT);
    }
    if options.allow_skip {
        hints.push(SKIP_HINT);
    }
    if options.allow_cancel {
        hints.push(CANCEL_HINT);
    }
    (!hints.is_empty()).then(|| format!("*{}*", hints.join(" | ")))
}

/// Full prompt text for step `index`: banner, prompt, hints.
pub fn render(
    prompt: &str,
    options: &WizardOptions,
    index: usize,
    total: usize,
    has_history: bool,
) -> String {
    let mut text = match &options.progress {
        Some(progress) => format!(
            "{}\n\n{prompt}",
            progress_banner(&progress.format, index, total)
        ),
        None => prompt.to_string(),
    };
    if let Some(hints) = navigation_hints(options, has_history) {
        text.push_str("\n\n");
        text.push_str(&hints);
    }
    text
}

#[cfg(test)]
mod tests {
    use {super::*, crate::options::ProgressOptions, rstest::rstest};

    fn all_nav() -> WizardOptions {
        WizardOptions {
            allow_back: true,
            allow_skip: true,
            allow_cancel: true,
            ..Default::default()
        }
    }

    #[rstest]
    #[case("cancel", true, Some(NavWord::Cancel))]
    #[case("  CANCEL ", true, Some(NavWord::Cancel))]
    #[case("Back", true, Some(NavWord::Back))]
    #[case("back", false, None)]
    #[case("skip", false, Some(NavWord::Skip))]
    #[case("cancel please", true, None)]
    fn classify_words(
        #[case] reply: &str,
        #[case] has_history: bool,
        #[case] expected: Option<NavWord>,
    ) {
        assert_eq!(NavWord::classify(reply, &all_nav(), has_history), expected);
    }

    #[test]
    fn disabled_words_are_answers() {
        let options = WizardOptions::default();
        assert_eq!(NavWord::classify("cancel", &options, true), None);
        assert_eq!(NavWord::classify("skip", &options, true), None);
        assert_eq!(NavWord::classify("back", &options, true), None);
    }

    #[rstest]
    #[case("📊 Step {current}/{total}", 0, 4, "📊 Step 1/4")]
    #[case("{percent}% done", 1, 3, "67% done")]
    #[case("{percent}%", 0, 8, "13%")]
    #[case("no placeholders", 2, 3, "no placeholders")]
    fn banner(
        #[case] format: &str,
        #[case] index: usize,
        #[case] total: usize,
        #[case] expected: &str,
    ) {
        assert_eq!(progress_banner(format, index, total), expected);
    }

    #[test]
    fn hints_depend_on_history() {
        assert_eq!(
            navigation_hints(&all_nav(), false).as_deref(),
            Some("*Type `skip` to skip this step | Type `cancel` to abort*")
        );
        assert!(
            navigation_hints(&all_nav(), true)
                .unwrap()
                .starts_with("*Type `back`")
        );
        assert!(navigation_hints(&WizardOptions::default(), true).is_none());
    }

    #[test]
    fn render_with_progress_and_hints() {
        let options = WizardOptions {
            allow_cancel: true,
            progress: Some(ProgressOptions::default()),
            ..Default::default()
        };
        assert_eq!(
            render("Name?", &options, 0, 2, false),
            "📊 Step 1/2\n\nName?\n\n*Type `cancel` to abort*"
        );
        assert_eq!(render("Name?", &WizardOptions::default(), 0, 2, false), "Name?");
    }
}
