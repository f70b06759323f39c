use std::{
    cell::RefCell,
    collections::BTreeMap,
    fs,
    io::{self, ErrorKind, Read, Write},
    path::{Path, PathBuf},
    rc::Rc,
};

/// Default location of the kernel's GPIO sysfs interface.
pub static SYSFS_ROOT: &str = "/sys/class/gpio";

/// Access to the files of a GPIO sysfs tree.
///
/// Every call opens the file, performs a single write or read and closes it again.
pub trait Sysfs {
    /// Writes `contents` to the existing file at `path`.
    fn write(&self, path: &Path, contents: &str) -> io::Result<()>;

    /// Reads the whole file at `path`.
    fn read(&self, path: &Path) -> io::Result<String>;

    fn exists(&self, path: &Path) -> bool;
}

/// The real filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct SysfsFiles;

impl Sysfs for SysfsFiles {
    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        let mut f = fs::OpenOptions::new().write(true).open(path)?;
        f.write_all(contents.as_bytes())
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        let mut f = fs::OpenOptions::new().read(true).open(path)?;
        let mut value = String::new();
        f.read_to_string(&mut value)?;
        Ok(value)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }
}

#[derive(Debug, Default)]
struct MemoryState {
    root: PathBuf,
    files: BTreeMap<PathBuf, String>,
    writes: Vec<(PathBuf, String)>,
    reads: Vec<PathBuf>,
}

impl MemoryState {
    fn line_dir(&self, line: u32) -> PathBuf {
        self.root.join(format!("gpio{}", line))
    }

    fn parse_line(contents: &str) -> io::Result<u32> {
        contents
            .trim()
            .parse::<u32>()
            .map_err(|_| io::Error::new(ErrorKind::InvalidInput, "Invalid argument"))
    }

    fn export(&mut self, contents: &str) -> io::Result<()> {
        let line = Self::parse_line(contents)?;
        let dir = self.line_dir(line);
        if self.files.contains_key(&dir.join("value")) {
            return Err(io::Error::new(ErrorKind::Other, "Device or resource busy"));
        }

        self.files.insert(dir.join("direction"), String::from("in"));
        self.files.insert(dir.join("value"), String::from("0"));
        Ok(())
    }

    fn unexport(&mut self, contents: &str) -> io::Result<()> {
        let line = Self::parse_line(contents)?;
        let dir = self.line_dir(line);
        if self.files.remove(&dir.join("value")).is_none() {
            return Err(io::Error::new(ErrorKind::InvalidInput, "Invalid argument"));
        }

        self.files.remove(&dir.join("direction"));
        Ok(())
    }

    fn write_direction(&mut self, path: &Path, contents: &str) -> io::Result<()> {
        match contents.trim() {
            direction @ ("in" | "out") => {
                self.files.insert(path.to_path_buf(), direction.to_string());
                Ok(())
            }
            _ => Err(io::Error::new(ErrorKind::InvalidInput, "Invalid argument")),
        }
    }

    fn write_value(&mut self, path: &Path, contents: &str) -> io::Result<()> {
        let direction = path
            .parent()
            .and_then(|dir| self.files.get(&dir.join("direction")));
        if direction.map(String::as_str) == Some("in") {
            return Err(io::Error::new(
                ErrorKind::PermissionDenied,
                "Operation not permitted",
            ));
        }

        let value = match contents.trim().parse::<i64>() {
            Ok(0) => "0",
            Ok(_) => "1",
            Err(_) => return Err(io::Error::new(ErrorKind::InvalidInput, "Invalid argument")),
        };
        self.files.insert(path.to_path_buf(), value.to_string());
        Ok(())
    }

    fn write(&mut self, path: &Path, contents: &str) -> io::Result<()> {
        self.writes.push((path.to_path_buf(), contents.to_string()));

        if !self.files.contains_key(path) {
            return Err(io::Error::new(ErrorKind::NotFound, "No such file or directory"));
        }

        if path == self.root.join("export") {
            return self.export(contents);
        }
        if path == self.root.join("unexport") {
            return self.unexport(contents);
        }

        match path.file_name().and_then(|name| name.to_str()) {
            Some("direction") => self.write_direction(path, contents),
            Some("value") => self.write_value(path, contents),
            _ => {
                self.files.insert(path.to_path_buf(), contents.to_string());
                Ok(())
            }
        }
    }
}

/// An in-memory stand-in for the GPIO sysfs tree.
///
/// It behaves like the kernel for the files this crate touches: writing a line
/// number to `export` creates `gpio<N>/direction` (initially `in`) and
/// `gpio<N>/value` (initially `0`), exporting a line twice fails, `unexport`
/// removes the line again and values cannot be written while the direction is
/// `in`. Clones share the same tree, and every attempted read and write is
/// recorded.
///
/// # Example
///
/// ```rust
/// use std::path::Path;
/// use pi_pin::sysfs::{MemorySysfs, Sysfs};
///
/// let fs = MemorySysfs::new("/sys/class/gpio");
/// fs.write(Path::new("/sys/class/gpio/export"), "17").unwrap();
/// assert!(fs.exists(Path::new("/sys/class/gpio/gpio17/value")));
/// ```
#[derive(Debug, Clone, Default)]
pub struct MemorySysfs {
    state: Rc<RefCell<MemoryState>>,
}

impl MemorySysfs {
    /// Creates a tree holding only the `export` and `unexport` control files.
    pub fn new(root: impl Into<PathBuf>) -> Self {
        let root = root.into();
        let mut files = BTreeMap::new();
        files.insert(root.join("export"), String::new());
        files.insert(root.join("unexport"), String::new());

        MemorySysfs {
            state: Rc::new(RefCell::new(MemoryState {
                root,
                files,
                ..MemoryState::default()
            })),
        }
    }

    /// Puts `contents` at `path` directly, bypassing the kernel rules.
    pub fn set_file(&self, path: impl Into<PathBuf>, contents: &str) {
        self.state
            .borrow_mut()
            .files
            .insert(path.into(), contents.to_string());
    }

    pub fn remove_file(&self, path: &Path) {
        self.state.borrow_mut().files.remove(path);
    }

    pub fn file(&self, path: &Path) -> Option<String> {
        self.state.borrow().files.get(path).cloned()
    }

    /// Every attempted write, in order, including the ones that failed.
    pub fn writes(&self) -> Vec<(PathBuf, String)> {
        self.state.borrow().writes.clone()
    }

    /// Every attempted read, in order.
    pub fn reads(&self) -> Vec<PathBuf> {
        self.state.borrow().reads.clone()
    }
}

impl Sysfs for MemorySysfs {
    fn write(&self, path: &Path, contents: &str) -> io::Result<()> {
        self.state.borrow_mut().write(path, contents)
    }

    fn read(&self, path: &Path) -> io::Result<String> {
        let mut state = self.state.borrow_mut();
        state.reads.push(path.to_path_buf());
        state
            .files
            .get(path)
            .cloned()
            .ok_or_else(|| io::Error::new(ErrorKind::NotFound, "No such file or directory"))
    }

    fn exists(&self, path: &Path) -> bool {
        self.state
            .borrow()
            .files
            .keys()
            .any(|file| file.starts_with(path))
    }
}
