use log::info;
use serde::Serialize;
use sha2::{Digest, Sha256};
use std::fs::{self, File};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::definition::FileSpec;
use crate::engine::TemplateEngine;
use crate::remap::{self, TagError};

#[derive(Error, Debug)]
pub enum GenerateError {
    #[error("{template}: {source}")]
    Tag {
        template: String,
        #[source]
        source: TagError,
    },
    #[error("unable to load {path:?}: {source}")]
    Read {
        path: PathBuf,
        source: io::Error,
    },
    #[error("template issue in {template}: {source}")]
    Compile {
        template: String,
        #[source]
        source: minijinja::Error,
    },
    #[error("unable to interpret {dest:?}: {source}")]
    Render {
        dest: PathBuf,
        #[source]
        source: minijinja::Error,
    },
    #[error("filesystem error on {path:?}: {source}")]
    Io {
        path: PathBuf,
        source: io::Error,
    },
}

/// Per-file generation: read source, remap delimiters, render against the
/// model, and report whether the destination actually changed.
///
/// Change detection is whole-file: the previous content hash is read before
/// the destination is overwritten, the new hash is computed over the bytes
/// as they stream to disk, and permission bits are compared independently.
pub struct Generator<'a> {
    engine: &'a TemplateEngine,
    template_dir: PathBuf,
    dest_dir: PathBuf,
    default_chmod: u32,
}

impl<'a> Generator<'a> {
    pub fn new(
        engine: &'a TemplateEngine,
        template_dir: impl Into<PathBuf>,
        dest_dir: impl Into<PathBuf>,
        default_chmod: u32,
    ) -> Self {
        Self {
            engine,
            template_dir: template_dir.into(),
            dest_dir: dest_dir.into(),
            default_chmod,
        }
    }

    /// Renders one template spec to its destination. Returns whether the
    /// destination content or permissions changed.
    pub fn generate_template<T: Serialize>(
        &self,
        dest_name: &str,
        spec: &FileSpec,
        model: &T,
    ) -> Result<bool, GenerateError> {
        let src = self.template_dir.join(&spec.template);
        let dest = self.dest_dir.join(dest_name);

        let mut changed = ensure_parent(&dest)?;

        let body = fs::read_to_string(&src).map_err(|source| GenerateError::Read {
            path: src.clone(),
            source,
        })?;
        let body = remap::remap(&body, &spec.tag).map_err(|source| GenerateError::Tag {
            template: spec.template.clone(),
            source,
        })?;

        // Compile before the destination is touched, so a syntax error never
        // truncates an existing output file.
        self.engine
            .check_compile(&body)
            .map_err(|source| GenerateError::Compile {
                template: spec.template.clone(),
                source,
            })?;

        let prior = prior_digest(&dest);

        let out = File::create(&dest).map_err(|source| GenerateError::Io {
            path: dest.clone(),
            source,
        })?;
        let mut writer = HashingWriter::new(out);
        self.engine
            .render_to_write(&body, model, &mut writer)
            .map_err(|source| GenerateError::Render {
                dest: dest.clone(),
                source,
            })?;
        let digest = writer.finalize();

        changed |= match prior {
            Some(prior) => prior != digest,
            None => true,
        };
        changed |= self.apply_chmod(&dest, spec)?;

        info!("generated {:?} (changed: {})", dest, changed);
        Ok(changed)
    }

    /// Copies one verbatim source to its destination, with the same change
    /// detection as a rendered template.
    pub fn copy_source(&self, dest_name: &str, spec: &FileSpec) -> Result<bool, GenerateError> {
        let src_name = if spec.source.is_empty() {
            dest_name
        } else {
            spec.source.as_str()
        };
        let src = self.template_dir.join(src_name);
        let dest = self.dest_dir.join(dest_name);

        let mut changed = ensure_parent(&dest)?;

        let bytes = fs::read(&src).map_err(|source| GenerateError::Read {
            path: src.clone(),
            source,
        })?;
        let prior = prior_digest(&dest);
        fs::write(&dest, &bytes).map_err(|source| GenerateError::Io {
            path: dest.clone(),
            source,
        })?;
        let digest: [u8; 32] = Sha256::digest(&bytes).into();

        changed |= match prior {
            Some(prior) => prior != digest,
            None => true,
        };
        changed |= self.apply_chmod(&dest, spec)?;

        info!("copied {:?} (changed: {})", dest, changed);
        Ok(changed)
    }

    fn apply_chmod(&self, dest: &Path, spec: &FileSpec) -> Result<bool, GenerateError> {
        let mode = spec.chmod.unwrap_or(self.default_chmod);
        apply_mode(dest, mode).map_err(|source| GenerateError::Io {
            path: dest.to_path_buf(),
            source,
        })
    }
}

/// Creates the destination's parent directory when missing. Returns true if
/// a directory had to be created; already-existing directories are not an
/// error.
fn ensure_parent(dest: &Path) -> Result<bool, GenerateError> {
    if let Some(parent) = dest.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            fs::create_dir_all(parent).map_err(|source| GenerateError::Io {
                path: parent.to_path_buf(),
                source,
            })?;
            return Ok(true);
        }
    }
    Ok(false)
}

/// Content hash of the previous destination file, read before overwriting.
/// An absent or unreadable prior file yields None, which is treated as
/// unconditionally changed.
fn prior_digest(path: &Path) -> Option<[u8; 32]> {
    let bytes = fs::read(path).ok()?;
    Some(Sha256::digest(&bytes).into())
}

#[cfg(unix)]
fn apply_mode(path: &Path, mode: u32) -> io::Result<bool> {
    use std::os::unix::fs::PermissionsExt;
    let current = fs::metadata(path)?.permissions().mode() & 0o7777;
    if current == mode {
        return Ok(false);
    }
    fs::set_permissions(path, fs::Permissions::from_mode(mode))?;
    Ok(true)
}

#[cfg(not(unix))]
fn apply_mode(_path: &Path, _mode: u32) -> io::Result<bool> {
    Ok(false)
}

/// Tees rendered bytes into the destination file while feeding the content
/// hash, so the hash covers exactly the bytes that reached the writer.
struct HashingWriter<W: Write> {
    inner: W,
    hasher: Sha256,
}

impl<W: Write> HashingWriter<W> {
    fn new(inner: W) -> Self {
        Self {
            inner,
            hasher: Sha256::new(),
        }
    }

    fn finalize(self) -> [u8; 32] {
        self.hasher.finalize().into()
    }
}

impl<W: Write> Write for HashingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let n = self.inner.write(buf)?;
        self.hasher.update(&buf[..n]);
        Ok(n)
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::collections::HashMap;
    use tempfile::tempdir;

    fn spec(template: &str, tag: &str, chmod: Option<u32>) -> FileSpec {
        FileSpec {
            chmod,
            template: template.to_string(),
            tag: tag.to_string(),
            source: String::new(),
            condition: String::new(),
        }
    }

    #[test]
    fn test_generate_then_regenerate_is_unchanged() {
        let dir = tempdir().unwrap();
        let tmpl_dir = dir.path().join("templates");
        let dest_dir = dir.path().join("out");
        fs::create_dir_all(&tmpl_dir).unwrap();
        fs::write(tmpl_dir.join("greeting.tmpl"), "Hello, {{ source.name }}!\n").unwrap();

        let engine = TemplateEngine::new();
        let generator = Generator::new(&engine, &tmpl_dir, &dest_dir, 0o644);
        let model = crate::model::SourceModel::new(json!({"name": "World"}));
        let spec = spec("greeting.tmpl", "", Some(0o644));

        let changed = generator
            .generate_template("greeting.txt", &spec, &model)
            .unwrap();
        assert!(changed, "first render must report changed");
        assert_eq!(
            fs::read_to_string(dest_dir.join("greeting.txt")).unwrap(),
            "Hello, World!\n"
        );

        let changed = generator
            .generate_template("greeting.txt", &spec, &model)
            .unwrap();
        assert!(!changed, "identical re-render must report unchanged");
    }

    #[test]
    fn test_content_change_is_detected() {
        let dir = tempdir().unwrap();
        let tmpl_dir = dir.path().to_path_buf();
        let dest_dir = dir.path().join("out");
        fs::write(tmpl_dir.join("v.tmpl"), "version={{ source.version }}\n").unwrap();

        let engine = TemplateEngine::new();
        let generator = Generator::new(&engine, &tmpl_dir, &dest_dir, 0o644);
        let spec = spec("v.tmpl", "", None);

        let model = crate::model::SourceModel::new(json!({"version": "1"}));
        assert!(generator.generate_template("v.txt", &spec, &model).unwrap());
        let model = crate::model::SourceModel::new(json!({"version": "2"}));
        assert!(generator.generate_template("v.txt", &spec, &model).unwrap());
    }

    #[cfg(unix)]
    #[test]
    fn test_permission_only_change_is_detected() {
        let dir = tempdir().unwrap();
        let tmpl_dir = dir.path().to_path_buf();
        let dest_dir = dir.path().join("out");
        fs::write(tmpl_dir.join("s.tmpl"), "static\n").unwrap();

        let engine = TemplateEngine::new();
        let generator = Generator::new(&engine, &tmpl_dir, &dest_dir, 0o644);

        let model: HashMap<String, String> = HashMap::new();
        let first = spec("s.tmpl", "", Some(0o644));
        assert!(generator.generate_template("s.txt", &first, &model).unwrap());
        assert!(!generator.generate_template("s.txt", &first, &model).unwrap());

        let second = spec("s.tmpl", "", Some(0o600));
        assert!(
            generator.generate_template("s.txt", &second, &model).unwrap(),
            "identical content with a different mode must report changed"
        );
    }

    #[test]
    fn test_custom_tag_round_trip() {
        let dir = tempdir().unwrap();
        let tmpl_dir = dir.path().to_path_buf();
        let dest_dir = dir.path().join("out");
        // Output is itself a template: native delimiters must be emitted
        // verbatim while the custom pair carries the live expressions.
        fs::write(
            tmpl_dir.join("ci.tmpl"),
            "image: (( source.image ))\ncmd: {{ .Values.cmd }}\n",
        )
        .unwrap();

        let engine = TemplateEngine::new();
        let generator = Generator::new(&engine, &tmpl_dir, &dest_dir, 0o644);
        let model = crate::model::SourceModel::new(json!({"image": "alpine"}));
        let spec = spec("ci.tmpl", "(())", None);

        generator.generate_template("ci.yaml", &spec, &model).unwrap();
        assert_eq!(
            fs::read_to_string(dest_dir.join("ci.yaml")).unwrap(),
            "image: alpine\ncmd: {{ .Values.cmd }}\n"
        );
    }

    #[test]
    fn test_invalid_tag_is_fatal_for_the_file() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("x.tmpl"), "body").unwrap();
        let engine = TemplateEngine::new();
        let generator = Generator::new(&engine, dir.path(), dir.path().join("out"), 0o644);
        let model: HashMap<String, String> = HashMap::new();
        let err = generator
            .generate_template("x", &spec("x.tmpl", "((", None), &model)
            .unwrap_err();
        assert!(matches!(err, GenerateError::Tag { .. }));
    }

    #[test]
    fn test_missing_lookup_key_aborts_render() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("x.tmpl"), "{{ lookup(creds, 'token') }}").unwrap();
        let engine = TemplateEngine::new();
        let generator = Generator::new(&engine, dir.path(), dir.path().join("out"), 0o644);
        let model = HashMap::from([("creds", HashMap::<String, String>::new())]);
        let err = generator
            .generate_template("x", &spec("x.tmpl", "", None), &model)
            .unwrap_err();
        match err {
            GenerateError::Render { source, .. } => {
                assert!(source.to_string().contains("missing key"), "{source}")
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_compile_error_does_not_truncate_destination() {
        let dir = tempdir().unwrap();
        let dest_dir = dir.path().join("out");
        fs::create_dir_all(&dest_dir).unwrap();
        fs::write(dest_dir.join("x"), "previous output").unwrap();
        fs::write(dir.path().join("x.tmpl"), "{% broken").unwrap();

        let engine = TemplateEngine::new();
        let generator = Generator::new(&engine, dir.path(), &dest_dir, 0o644);
        let model: HashMap<String, String> = HashMap::new();
        let err = generator
            .generate_template("x", &spec("x.tmpl", "", None), &model)
            .unwrap_err();
        assert!(matches!(err, GenerateError::Compile { .. }));
        assert_eq!(
            fs::read_to_string(dest_dir.join("x")).unwrap(),
            "previous output"
        );
    }

    #[test]
    fn test_copy_source_idempotence() {
        let dir = tempdir().unwrap();
        let dest_dir = dir.path().join("out");
        fs::write(dir.path().join("README"), "docs\n").unwrap();

        let engine = TemplateEngine::new();
        let generator = Generator::new(&engine, dir.path(), &dest_dir, 0o644);
        let spec = FileSpec::default();

        assert!(generator.copy_source("README", &spec).unwrap());
        assert!(!generator.copy_source("README", &spec).unwrap());
        assert_eq!(fs::read_to_string(dest_dir.join("README")).unwrap(), "docs\n");
    }

    #[test]
    fn test_copy_source_with_explicit_source_path() {
        let dir = tempdir().unwrap();
        let dest_dir = dir.path().join("out");
        fs::create_dir_all(dir.path().join("common")).unwrap();
        fs::write(dir.path().join("common/config.yml"), "a: 1\n").unwrap();

        let engine = TemplateEngine::new();
        let generator = Generator::new(&engine, dir.path(), &dest_dir, 0o644);
        let spec = FileSpec {
            source: "common/config.yml".to_string(),
            ..FileSpec::default()
        };

        assert!(generator.copy_source("config.yml", &spec).unwrap());
        assert_eq!(
            fs::read_to_string(dest_dir.join("config.yml")).unwrap(),
            "a: 1\n"
        );
    }

    #[test]
    fn test_parent_directory_creation_counts_as_changed() {
        let dir = tempdir().unwrap();
        fs::write(dir.path().join("n.tmpl"), "nested\n").unwrap();
        let engine = TemplateEngine::new();
        let generator = Generator::new(&engine, dir.path(), dir.path().join("out"), 0o644);
        let spec = spec("n.tmpl", "", None);
        let model: HashMap<String, String> = HashMap::new();
        let changed = generator
            .generate_template("deep/nested/file.txt", &spec, &model)
            .unwrap();
        assert!(changed);
        assert!(dir.path().join("out/deep/nested/file.txt").exists());
    }
}
