#![allow(dead_code)]

use std::{
    fs,
    path::{Path, PathBuf},
    sync::{
        atomic::{AtomicUsize, Ordering},
        Arc,
    },
    time::Duration,
};

use loader::{ClassDefinition, ClassFinder, LoadError, Origin, ProtectionDomain};
use tracing::Level;
use tracing_subscriber::fmt;

pub mod bin;

const TMP_DIR: &str = env!("CARGO_TARGET_TMPDIR");

lazy_static::lazy_static! {
    /// javac output for `public class TestClass {}`, major version 49.
    pub static ref TEST_CLASS: Vec<u8> = vec![
        0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00, 0x00, 0x31, 0x00, 0x0D, 0x0A, 0x00,
        0x03, 0x00, 0x0A, 0x07, 0x00, 0x0B, 0x07, 0x00, 0x0C, 0x01, 0x00, 0x06,
        0x3C, 0x69, 0x6E, 0x69, 0x74, 0x3E, 0x01, 0x00, 0x03, 0x28, 0x29, 0x56,
        0x01, 0x00, 0x04, 0x43, 0x6F, 0x64, 0x65, 0x01, 0x00, 0x0F, 0x4C, 0x69,
        0x6E, 0x65, 0x4E, 0x75, 0x6D, 0x62, 0x65, 0x72, 0x54, 0x61, 0x62, 0x6C,
        0x65, 0x01, 0x00, 0x0A, 0x53, 0x6F, 0x75, 0x72, 0x63, 0x65, 0x46, 0x69,
        0x6C, 0x65, 0x01, 0x00, 0x0E, 0x54, 0x65, 0x73, 0x74, 0x43, 0x6C, 0x61,
        0x73, 0x73, 0x2E, 0x6A, 0x61, 0x76, 0x61, 0x0C, 0x00, 0x04, 0x00, 0x05,
        0x01, 0x00, 0x09, 0x54, 0x65, 0x73, 0x74, 0x43, 0x6C, 0x61, 0x73, 0x73,
        0x01, 0x00, 0x10, 0x6A, 0x61, 0x76, 0x61, 0x2F, 0x6C, 0x61, 0x6E, 0x67,
        0x2F, 0x4F, 0x62, 0x6A, 0x65, 0x63, 0x74, 0x00, 0x21, 0x00, 0x02, 0x00,
        0x03, 0x00, 0x00, 0x00, 0x00, 0x00, 0x01, 0x00, 0x01, 0x00, 0x04, 0x00,
        0x05, 0x00, 0x01, 0x00, 0x06, 0x00, 0x00, 0x00, 0x1D, 0x00, 0x01, 0x00,
        0x01, 0x00, 0x00, 0x00, 0x05, 0x2A, 0xB7, 0x00, 0x01, 0xB1, 0x00, 0x00,
        0x00, 0x01, 0x00, 0x07, 0x00, 0x00, 0x00, 0x06, 0x00, 0x01, 0x00, 0x00,
        0x00, 0x01, 0x00, 0x01, 0x00, 0x08, 0x00, 0x00, 0x00, 0x02, 0x00, 0x09,
    ];
}

pub fn init_logging() {
    let format = fmt::format()
        .with_ansi(false)
        .without_time()
        .with_level(true)
        .with_target(false)
        .with_thread_names(true)
        .with_source_location(false)
        .compact();

    let _ = tracing_subscriber::fmt()
        .with_max_level(Level::DEBUG)
        .event_format(format)
        .with_test_writer()
        .try_init();
}

/// Assembles minimal class files: a pool, a header and optionally a SourceFile attribute.
pub struct ClassBuilder {
    name: String,
    super_class: String,
    interfaces: Vec<String>,
    source_file: Option<String>,
    major_version: u16,
    access_flags: u16,
}

impl ClassBuilder {
    /// `name` is a binary name, `a.b.C`.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.replace('.', "/"),
            super_class: "java/lang/Object".to_string(),
            interfaces: vec![],
            source_file: None,
            major_version: 52,
            access_flags: 0x0021,
        }
    }

    pub fn extends(mut self, super_class: &str) -> Self {
        self.super_class = super_class.replace('.', "/");
        self
    }

    pub fn implements(mut self, interface: &str) -> Self {
        self.interfaces.push(interface.replace('.', "/"));
        self
    }

    pub fn source_file(mut self, file: &str) -> Self {
        self.source_file = Some(file.to_string());
        self
    }

    pub fn major_version(mut self, version: u16) -> Self {
        self.major_version = version;
        self
    }

    pub fn access_flags(mut self, flags: u16) -> Self {
        self.access_flags = flags;
        self
    }

    pub fn build(&self) -> Vec<u8> {
        let mut pool: Vec<u8> = vec![];
        let mut next_index: u16 = 1;

        let mut utf8 = |pool: &mut Vec<u8>, value: &str| {
            pool.push(1);
            pool.extend((value.len() as u16).to_be_bytes());
            pool.extend(value.as_bytes());
            next_index += 1;
            next_index - 1
        };

        let this_name = utf8(&mut pool, self.name.as_str());
        let super_name = utf8(&mut pool, self.super_class.as_str());
        let interface_names: Vec<u16> = self
            .interfaces
            .iter()
            .map(|i| utf8(&mut pool, i.as_str()))
            .collect();
        let source_file = self
            .source_file
            .as_ref()
            .map(|file| (utf8(&mut pool, "SourceFile"), utf8(&mut pool, file.as_str())));

        let mut class = |pool: &mut Vec<u8>, name_index: u16| {
            pool.push(7);
            pool.extend(name_index.to_be_bytes());
            next_index += 1;
            next_index - 1
        };

        let this_class = class(&mut pool, this_name);
        let super_class = class(&mut pool, super_name);
        let interfaces: Vec<u16> = interface_names
            .into_iter()
            .map(|i| class(&mut pool, i))
            .collect();

        let mut out = vec![0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00];
        out.extend(self.major_version.to_be_bytes());
        out.extend(next_index.to_be_bytes());
        out.extend(pool);

        out.extend(self.access_flags.to_be_bytes());
        out.extend(this_class.to_be_bytes());
        out.extend(super_class.to_be_bytes());

        out.extend((interfaces.len() as u16).to_be_bytes());
        for interface in interfaces {
            out.extend(interface.to_be_bytes());
        }

        // No fields or methods
        out.extend([0, 0, 0, 0]);

        match source_file {
            Some((attribute_name, file)) => {
                out.extend(1u16.to_be_bytes());
                out.extend(attribute_name.to_be_bytes());
                out.extend(2u32.to_be_bytes());
                out.extend(file.to_be_bytes());
            }
            None => out.extend(0u16.to_be_bytes()),
        }

        out
    }
}

/// Serves classes built on demand and counts how often it was asked.
#[derive(Default)]
pub struct CountingFinder {
    pub calls: Arc<AtomicUsize>,
    pub origin: Option<Origin>,
}

impl CountingFinder {
    pub fn new() -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let finder = Self {
            calls: Arc::clone(&calls),
            origin: None,
        };

        (finder, calls)
    }

    pub fn with_origin(mut self, origin: &str) -> Self {
        self.origin = Some(Origin::new(origin));
        self
    }
}

impl ClassFinder for CountingFinder {
    fn find_class(&self, name: &str) -> Result<ClassDefinition, LoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        if name.starts_with("missing.") {
            return Err(LoadError::NotFound(name.to_string()));
        }

        Ok(ClassDefinition {
            name: Some(name.to_string()),
            bytes: ClassBuilder::new(name).build().into(),
            domain: self.origin.clone().map(ProtectionDomain::from_origin),
        })
    }
}

/// Serves fixed bytes, stalling on every call so concurrent loads pile up behind the first.
pub struct SlowFinder {
    pub calls: Arc<AtomicUsize>,
    bytes: Vec<u8>,
    delay: Duration,
}

impl SlowFinder {
    pub fn new(bytes: Vec<u8>) -> (Self, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let finder = Self {
            calls: Arc::clone(&calls),
            bytes,
            delay: Duration::from_millis(50),
        };

        (finder, calls)
    }
}

impl ClassFinder for SlowFinder {
    fn find_class(&self, name: &str) -> Result<ClassDefinition, LoadError> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        std::thread::sleep(self.delay);

        Ok(ClassDefinition {
            name: Some(name.to_string()),
            bytes: self.bytes.clone().into(),
            domain: None,
        })
    }
}

/// A scratch directory under the cargo target dir, removed on drop.
pub struct TempDir {
    path: PathBuf,
}

static TEMP_COUNTER: AtomicUsize = AtomicUsize::new(0);

impl TempDir {
    pub fn new(label: &str) -> Self {
        let id = TEMP_COUNTER.fetch_add(1, Ordering::SeqCst);
        let path = Path::new(TMP_DIR).join(format!("{}-{}-{}", label, std::process::id(), id));

        fs::create_dir_all(&path).expect("temp dir to be created");
        Self { path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn origin(&self) -> Origin {
        Origin::new(format!("file:{}/", self.path.display()))
    }

    pub fn write(&self, relative: &str, contents: impl AsRef<[u8]>) -> &Self {
        let target = self.path.join(relative);
        if let Some(parent) = target.parent() {
            fs::create_dir_all(parent).expect("parent dirs to be created");
        }

        fs::write(target, contents).expect("file to be written");
        self
    }

    /// Store `class` at the path the classpath would look for it under.
    pub fn write_class(&self, binary_name: &str, class: &[u8]) -> &Self {
        self.write(&format!("{}.class", binary_name.replace('.', "/")), class)
    }
}

impl Drop for TempDir {
    fn drop(&mut self) {
        let _ = fs::remove_dir_all(&self.path);
    }
}
