// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Engine options rendered from a hypothesis

use std::fmt;

use crate::hypothesis::{
    Algorithm, Hypothesis, PThreadsMode, DEFAULT_GRADATION, DEFAULT_MAX_THREADS, DEFAULT_VERBOSE,
};

/// One flag with its optional value.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommandOption {
    /// Flag as written, dashes included.
    pub flag: String,
    pub value: Option<String>,
}

impl CommandOption {
    fn new(flag: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            flag: flag.into(),
            value: Some(value.into()),
        }
    }

    fn switch(flag: impl Into<String>) -> Self {
        Self {
            flag: flag.into(),
            value: None,
        }
    }

    /// Name and value as passed to an in-process engine.
    pub fn parameter(&self) -> (String, String) {
        let name = self.flag.trim_start_matches('-');
        match (&self.value, name.split_once('=')) {
            (Some(value), _) => (name.to_string(), value.clone()),
            (None, Some((name, value))) => (name.to_string(), value.to_string()),
            (None, None) => (name.to_string(), String::new()),
        }
    }
}

/// Engine options in their fixed order, followed by raw text.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CommandLine {
    options: Vec<CommandOption>,
    raw_text: String,
}

/// Tokens of the raw text, for "already given" checks.
struct RawText<'a> {
    tokens: Vec<&'a str>,
}

impl<'a> RawText<'a> {
    fn new(text: &'a str) -> Self {
        Self {
            tokens: text.split_whitespace().collect(),
        }
    }

    fn mentions(&self, flag: &str) -> bool {
        self.tokens.iter().any(|t| {
            *t == flag
                || t.strip_prefix(flag)
                    .map_or(false, |rest| rest.starts_with('='))
        })
    }
}

impl CommandLine {
    /// Render `hyp` into engine options.
    ///
    /// With `has_shape_to_mesh` every component is meshed. Options equal to
    /// their engine default are left out, and so is anything the raw text
    /// already sets.
    pub fn build(hyp: &Hypothesis, has_shape_to_mesh: bool) -> Self {
        let raw = RawText::new(&hyp.text_option);
        let mut options = Vec::new();
        let mut push = |option: CommandOption| {
            if !raw.mentions(&option.flag) {
                options.push(option);
            }
        };

        let boundary_recovery = hyp.to_use_boundary_recovery || raw.mentions("-C");
        let optimizer = hyp.algorithm == Algorithm::Optimizer;

        if !boundary_recovery && !optimizer {
            let all = has_shape_to_mesh || hyp.to_mesh_holes;
            push(CommandOption::new(
                "--components",
                if all { "all" } else { "outside_components" },
            ));
        }
        if !boundary_recovery && optimizer {
            push(CommandOption::new("--optimisation", hyp.optimization.as_str()));
        }
        if !boundary_recovery {
            push(CommandOption::new(
                "--optimisation_level",
                hyp.optimization_level.as_str(),
            ));
        }
        if optimizer {
            push(CommandOption::new(
                "--split_overconstrained_elements",
                hyp.split_overconstrained.as_str(),
            ));
            if hyp.smooth_off_slivers {
                push(CommandOption::new("--smooth_off_slivers", "yes"));
            }
        }
        if hyp.pthreads_mode != PThreadsMode::None {
            push(CommandOption::new("--pthreads_mode", hyp.pthreads_mode.as_str()));
        }
        if hyp.max_threads != DEFAULT_MAX_THREADS {
            push(CommandOption::new(
                "--max_number_of_threads",
                hyp.max_threads.to_string(),
            ));
        }
        if let Some(memory) = hyp.maximum_memory {
            push(CommandOption::new("--max_memory", memory.to_string()));
        }
        if let (Some(memory), false) = (hyp.initial_memory, boundary_recovery) {
            push(CommandOption::new("--automatic_memory", memory.to_string()));
        }
        if hyp.verbose_level != DEFAULT_VERBOSE {
            push(CommandOption::new("--verbose", hyp.verbose_level.to_string()));
        }
        if !hyp.to_create_new_nodes {
            push(CommandOption::switch("--no_internal_points"));
        }
        if hyp.to_use_boundary_recovery {
            push(CommandOption::switch("-C"));
        }
        if hyp.fem_correction {
            push(CommandOption::switch("-FEM"));
        }
        if hyp.gradation != DEFAULT_GRADATION && !raw.mentions("-Dcpropa") {
            options.push(CommandOption::switch(format!("-Dcpropa={}", hyp.gradation)));
        }
        for (name, value) in hyp.advanced_options.iter() {
            let flag = format!("--{}", name);
            if raw.mentions(&flag) {
                continue;
            }
            options.push(if value.is_empty() {
                CommandOption::switch(flag)
            } else {
                CommandOption::new(flag, value)
            });
        }

        Self {
            options,
            raw_text: hyp.text_option.trim().to_string(),
        }
    }

    pub fn options(&self) -> &[CommandOption] {
        &self.options
    }

    pub fn raw_text(&self) -> &str {
        &self.raw_text
    }

    pub fn contains(&self, flag: &str) -> bool {
        self.options.iter().any(|o| o.flag == flag) || RawText::new(&self.raw_text).mentions(flag)
    }

    /// Arguments for the executable, one token each.
    pub fn to_args(&self) -> Vec<String> {
        let mut args = Vec::new();
        for option in &self.options {
            args.push(option.flag.clone());
            if let Some(value) = &option.value {
                args.push(value.clone());
            }
        }
        args.extend(self.raw_text.split_whitespace().map(str::to_string));
        args
    }

    /// `(name, value)` pairs for an in-process engine.
    pub fn parameters(&self) -> Vec<(String, String)> {
        let mut params: Vec<(String, String)> =
            self.options.iter().map(CommandOption::parameter).collect();
        params.extend(split_parameters(self.raw_text.split_whitespace()));
        params
    }
}

/// Group option tokens into `(name, value)` pairs.
///
/// Every dash-led token starts a parameter; the words that follow form its
/// value. A `1>` redirection ends the list.
pub fn split_parameters<'a>(tokens: impl IntoIterator<Item = &'a str>) -> Vec<(String, String)> {
    let mut params = Vec::new();
    let mut current: Option<(String, Vec<&str>)> = None;
    for token in tokens {
        if token.starts_with("1>") {
            break;
        }
        if token.starts_with('-') {
            if let Some((name, words)) = current.take() {
                params.push((name, words.join(" ")));
            }
            current = Some((token.trim_start_matches('-').to_string(), Vec::new()));
        } else if let Some((_, words)) = current.as_mut() {
            words.push(token);
        }
    }
    if let Some((name, words)) = current {
        params.push((name, words.join(" ")));
    }
    params
}

impl fmt::Display for CommandLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let args = self.to_args();
        write!(f, "{}", args.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::hypothesis::{Mode, OptimizationLevel};

    #[test]
    fn test_defaults_render_minimal_line() {
        let line = CommandLine::build(&Hypothesis::default(), false);
        assert_eq!(
            line.to_string(),
            "--components outside_components --optimisation_level standard"
        );
        let line = CommandLine::build(&Hypothesis::default(), true);
        assert!(line.to_string().starts_with("--components all"));
    }

    #[test]
    fn test_gradation_flag() {
        let mut hyp = Hypothesis::default();
        assert!(!CommandLine::build(&hyp, false).contains("-Dcpropa=1.05"));
        hyp.gradation = 1.2;
        let line = CommandLine::build(&hyp, false);
        assert!(line.to_args().contains(&"-Dcpropa=1.2".to_string()));
    }

    #[test]
    fn test_fixed_order() {
        let mut hyp = Hypothesis::default();
        hyp.text_option = "--raw_flag 3".into();
        hyp.fem_correction = true;
        hyp.to_create_new_nodes = false;
        hyp.verbose_level = 3;
        hyp.maximum_memory = Some(2048);
        hyp.initial_memory = Some(100);
        hyp.max_threads = 8;
        hyp.optimization_level = OptimizationLevel::Strong;
        hyp.gradation = 1.3;
        hyp.advanced_options.set("target_quality", "2").unwrap();

        let line = CommandLine::build(&hyp, false);
        assert_eq!(
            line.to_string(),
            "--components outside_components --optimisation_level strong \
             --max_number_of_threads 8 --max_memory 2048 --automatic_memory 100 \
             --verbose 3 --no_internal_points -FEM -Dcpropa=1.3 --target_quality 2 \
             --raw_flag 3"
        );
        assert_eq!(line, CommandLine::build(&hyp, false));
    }

    #[test]
    fn test_boundary_recovery_suppresses_flags() {
        let mut hyp = Hypothesis::default();
        hyp.to_use_boundary_recovery = true;
        hyp.initial_memory = Some(100);
        let line = CommandLine::build(&hyp, false);
        assert_eq!(line.to_string(), "-C");
    }

    #[test]
    fn test_raw_text_wins() {
        let mut hyp = Hypothesis::default();
        hyp.verbose_level = 2;
        hyp.text_option = "--verbose 7 --optimisation_level=light".into();
        let line = CommandLine::build(&hyp, false);
        let args = line.to_args();
        assert_eq!(args.iter().filter(|a| *a == "--verbose").count(), 1);
        assert!(!args.contains(&"standard".to_string()));
    }

    #[test]
    fn test_optimizer_line() {
        let mut hyp = Hypothesis::optimizer();
        hyp.split_overconstrained = Mode::Yes;
        hyp.smooth_off_slivers = true;
        hyp.pthreads_mode = PThreadsMode::Safe;
        let line = CommandLine::build(&hyp, false);
        assert_eq!(
            line.to_string(),
            "--optimisation yes --optimisation_level standard \
             --split_overconstrained_elements yes --smooth_off_slivers yes --pthreads_mode safe"
        );
    }

    #[test]
    fn test_parameters_split_raw_text() {
        let mut hyp = Hypothesis::default();
        hyp.gradation = 1.2;
        hyp.text_option = "--foo bar baz -x 1> out.txt".into();
        let params = CommandLine::build(&hyp, false).parameters();
        assert!(params.contains(&("Dcpropa".to_string(), "1.2".to_string())));
        assert!(params.contains(&("foo".to_string(), "bar baz".to_string())));
        assert_eq!(params.last(), Some(&("x".to_string(), String::new())));
    }

    #[test]
    fn test_split_executable_arguments() {
        let line = CommandLine::build(&Hypothesis::default(), false);
        let args = line.to_args();
        let params = split_parameters(args.iter().map(String::as_str));
        assert_eq!(params, line.parameters());
    }
}
