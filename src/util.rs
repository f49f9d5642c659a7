use std::path::{Path, PathBuf};

const UNSAFE_FILENAME_CHARACTERS: &str = ";:<>?/\\\"'|`{}[]#$^&*()";

/**
Replace every character that is awkward in a file name by an underscore.

```
use bruteabc::util::mkname;

assert_eq!(mkname("evidence (log).csv"), "evidence _log_.csv");
assert_eq!(mkname("a/b:c"), "a_b_c");
```
 */
pub fn mkname(filename: &str) -> String {
    filename
        .chars()
        .map(|c| {
            if UNSAFE_FILENAME_CHARACTERS.contains(c) {
                '_'
            } else {
                c
            }
        })
        .collect()
}

/**
The path an output named `name` is written to: the sanitized name inside
`dir`. Slashes in `name` are sanitized too, so every output lands directly in
`dir`.

```
use bruteabc::util::output_path;
use std::path::Path;

assert_eq!(output_path(Path::new("runs"), "out/ev.csv"), Path::new("runs/out_ev.csv"));
```
 */
pub fn output_path(dir: &Path, name: &str) -> PathBuf {
    dir.join(mkname(name))
}

/// Split `name.ext` into the stem and suffix used to derive per-metric and
/// per-parameter output files.
pub fn stem_and_suffix(filename: &str) -> (String, Option<String>) {
    let path = Path::new(filename);
    match (path.extension(), path.file_stem()) {
        (Some(ext), Some(stem)) => {
            let stem = path.with_file_name(stem);
            (
                stem.to_string_lossy().into_owned(),
                Some(ext.to_string_lossy().into_owned()),
            )
        }
        _ => (filename.to_string(), None),
    }
}

/// `stem_part.suffix`, or `stem_part` when there was no suffix.
pub fn derived_name(stem: &str, part: &str, suffix: Option<&str>) -> String {
    match suffix {
        Some(suffix) => format!("{}_{}.{}", stem, part, suffix),
        None => format!("{}_{}", stem, part),
    }
}

pub fn greater_of_two<T: PartialOrd>(a: T, b: T) -> T {
    if b < a {
        a
    } else {
        b
    }
}
