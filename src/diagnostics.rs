// SPDX-License-Identifier: Apache-2.0
// Copyright (c) 2025 Tetralink Team

//! Human readable descriptions of engine failures
//!
//! The engine reports problems as `ERR <code>` lines, often followed by the
//! 1-based ids of the offending vertices. [`scan_log`] collects them and
//! [`describe_failure`] builds the message shown to the user.

use std::collections::HashSet;
use std::path::Path;

/// Text for a known engine error code.
pub fn translate_error(code: u32) -> Option<&'static str> {
    let text = match code {
        0 => "The surface mesh includes a face of type other than edge, triangle or quadrilateral. This face type is not supported.",
        1 | 23600 => "Not enough memory for the face table.",
        2 | 3 => "Not enough memory.",
        4 => "Face is ignored.",
        5 | 8005 | 8006 => "End of file. Some data are missing in the file.",
        6 => "Read error on the file. There are wrong data in the file.",
        7 => "the metric file is inadequate (dimension other than 3).",
        8 => "the metric file is inadequate (values not per vertices).",
        9 => "the metric file contains more than one field.",
        10 => "the number of values in the \".bb\" (metric file) is incompatible with the expected value of number of mesh vertices in the \".noboite\" file.",
        12 => "Too many sub-domains.",
        13 | 131 => "the number of vertices is negative or null.",
        14 | 133 => "the number of faces is negative or null.",
        15 => "A face has a null vertex.",
        22 => "incompatible data.",
        132 => "the number of vertices is negative or null (in the \".mesh\" file).",
        1000 => "A face appears more than once in the input surface mesh.",
        1001 => "An edge appears more than once in the input surface mesh.",
        1002 => "A face has a vertex negative or null.",
        1003 => "NOT ENOUGH MEMORY.",
        2000 => "Not enough available memory.",
        2002 => "Some initial points cannot be inserted. The surface mesh is probably very bad in terms of quality or the input list of points is wrong.",
        2003 | 2004 | 2103 => "Some vertices are too close to one another or coincident.",
        2012 => "A vertex cannot be inserted.",
        2014 => "There are at least two points considered as coincident.",
        3000 => "The surface mesh regeneration step has failed.",
        3009 => "Constrained edge cannot be enforced.",
        3019 => "Constrained face cannot be enforced.",
        3029 => "Missing faces.",
        3100 => "No guess to start the definition of the connected component(s).",
        3101 => "The surface mesh includes at least one hole. The domain is not well defined.",
        3102 => "Impossible to define a component.",
        3103 => "The surface edge intersects another surface edge.",
        3104 => "The surface edge intersects the surface face.",
        3105 => "One boundary point lies within a surface face.",
        3106 => "One surface edge intersects a surface face.",
        3107 => "One boundary point lies within a surface edge.",
        3108 => "Insufficient memory ressources detected due to a bad quality surface mesh leading to too many swaps.",
        3109 => "Edge is unique (i.e., bounds a hole in the surface).",
        3122 | 9122 => "Presumably, the surface mesh is not compatible with the domain being processed.",
        3123 => "Too many components, too many sub-domain.",
        3209 => "The surface mesh includes at least one hole. Therefore there is no domain properly defined.",
        3300 | 3400 => "Statistics.",
        3500 => "Warning, it is dramatically tedious to enforce the boundary items.",
        4000 => "Not enough memory at this time, nevertheless, the program continues. The expected mesh will be correct but not really as large as required.",
        4002 => "see above error code, resulting quality may be poor.",
        4003 => "Not enough memory at this time, nevertheless, the program continues (warning).",
        8000 => "Unknown face type.",
        9000 => "A too small volume element is detected.",
        9001 => "There exists at least a null or negative volume element.",
        9002 => "There exist null or negative volume elements.",
        9003 => "A too small volume element is detected. A face is considered being degenerated.",
        9100 => "Some element is suspected to be very bad shaped or wrong.",
        9102 => "A too bad quality face is detected. This face is considered degenerated.",
        9112 => "A too bad quality face is detected. This face is degenerated.",
        9999 => "Abnormal error occured, contact hotline.",
        23601 => "The algorithm cannot run further. The surface mesh is probably very bad in terms of quality.",
        23602 => "Bad vertex number.",
        _ => return None,
    };
    Some(text)
}

const NODE: usize = 1;
const EDGE: usize = 2;
const TRIA: usize = 3;
const VOL: usize = 4;

/// Sizes of the id groups that follow an error code in the log.
fn entity_layout(code: u32) -> &'static [usize] {
    match code {
        15 => &[NODE, TRIA],
        1000 | 1002 | 3019 => &[TRIA],
        1001 | 3009 | 3109 => &[EDGE],
        2004 | 2014 | 2103 => &[NODE, NODE],
        2012 => &[NODE],
        3103 => &[EDGE, EDGE],
        3104 | 3106 => &[EDGE, TRIA],
        3105 => &[NODE, TRIA],
        3107 => &[NODE, EDGE],
        // element number first, then its vertices
        9000 => &[1, VOL],
        9112 => &[1, TRIA],
        _ => &[],
    }
}

/// One `ERR` report found in an engine log.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EngineError {
    pub code: u32,
    /// Groups of 1-based engine ids (vertices of bad edges, faces, ...).
    pub entities: Vec<Vec<i64>>,
}

impl EngineError {
    pub fn description(&self) -> Option<&'static str> {
        translate_error(self.code)
    }
}

fn leading_digits(text: &str) -> usize {
    text.bytes().take_while(u8::is_ascii_digit).count()
}

/// Read `count` integers from `text`, skipping any non-digit noise.
fn take_ids(text: &str, count: usize) -> Option<(Vec<i64>, usize)> {
    let bytes = text.as_bytes();
    let mut ids = Vec::with_capacity(count);
    let mut pos = 0;
    while ids.len() < count {
        while pos < bytes.len() && !bytes[pos].is_ascii_digit() {
            pos += 1;
        }
        if pos == bytes.len() {
            return None;
        }
        let negative = pos > 0 && bytes[pos - 1] == b'-';
        let len = leading_digits(&text[pos..]);
        let value: i64 = text[pos..pos + len].parse().ok()?;
        ids.push(if negative { -value } else { value });
        pos += len;
    }
    Some((ids, pos))
}

/// Every distinct `ERR <code>` report in `log`, in order of appearance.
pub fn scan_log(log: &str) -> Vec<EngineError> {
    let mut seen = HashSet::new();
    let mut errors = Vec::new();

    for (start, _) in log.match_indices("ERR ") {
        let rest = &log[start + 4..];
        let skipped = rest.len() - rest.trim_start().len();
        let digits = leading_digits(&rest[skipped..]);
        if digits == 0 {
            continue;
        }
        let Ok(code) = rest[skipped..skipped + digits].parse::<u32>() else {
            continue;
        };

        let mut end = skipped + digits;
        let mut entities = Vec::new();
        for &size in entity_layout(code) {
            match take_ids(&rest[end..], size) {
                Some((ids, used)) => {
                    entities.push(ids);
                    end += used;
                }
                None => break,
            }
        }

        // the same report repeated verbatim is listed once
        if seen.insert(&rest[..end]) {
            errors.push(EngineError { code, entities });
        }
    }
    errors
}

/// Message for a failed computation, built from its engine log.
///
/// `log_file` is where the full log can be found, when it was written to disk.
pub fn describe_failure(log: &str, log_file: Option<&Path>) -> String {
    let mut description = String::new();
    for error in scan_log(log) {
        let Some(text) = error.description() else {
            continue;
        };
        if !description.contains(text) {
            if !description.is_empty() {
                description.push('\n');
            }
            description.push_str(text);
        }
    }

    if description.is_empty() {
        if log.contains("connection to server failed") {
            description.push_str("Licence problems.");
        } else if log.contains("SEGMENTATION FAULT") {
            description.push_str("mg-tetra: SEGMENTATION FAULT. ");
        }
    }

    match log_file {
        Some(path) if description.is_empty() => {
            format!("See {} for problem description", path.display())
        }
        Some(path) => format!("{}\nSee {} for more information", description, path.display()),
        None if description.is_empty() => log.trim_end().to_string(),
        None => description,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_known_codes() {
        assert_eq!(
            translate_error(3109),
            Some("Edge is unique (i.e., bounds a hole in the surface).")
        );
        assert_eq!(translate_error(2103), translate_error(2003));
        assert_eq!(translate_error(4242), None);
    }

    #[test]
    fn test_scan_extracts_entities() {
        let log = "\
 ERR  3103 :  1 2 WITH  7 3
 ERR  3109 :  EDGE  5 6 UNIQUE
 ERR  3109 :  EDGE  5 6 UNIQUE
 ERR  9000
  ELEMENT  261 WITH VERTICES :  7 396 -8 242
";
        let errors = scan_log(log);
        assert_eq!(errors.len(), 3);
        assert_eq!(errors[0].entities, vec![vec![1, 2], vec![7, 3]]);
        assert_eq!(errors[1].code, 3109);
        assert_eq!(errors[1].entities, vec![vec![5, 6]]);
        assert_eq!(errors[2].entities, vec![vec![261], vec![7, 396, -8, 242]]);
    }

    #[test]
    fn test_description_lists_each_text_once() {
        let log = " ERR  2003\n ERR  2103 :  16 WITH  3\n ERR  3029\n";
        let file = PathBuf::from("/tmp/run.log");
        let message = describe_failure(log, Some(&file));
        assert_eq!(
            message,
            "Some vertices are too close to one another or coincident.\nMissing faces.\nSee /tmp/run.log for more information"
        );
    }

    #[test]
    fn test_fallback_messages() {
        let file = PathBuf::from("run.log");
        assert_eq!(
            describe_failure("connection to server failed", Some(&file)),
            "Licence problems.\nSee run.log for more information"
        );
        assert_eq!(
            describe_failure("nothing useful", Some(&file)),
            "See run.log for problem description"
        );
        assert_eq!(describe_failure("raw engine text\n", None), "raw engine text");
    }
}
