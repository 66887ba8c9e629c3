use crate::{
    errors::{FileOperation, IoError},
    survey::SurveyError,
};
use colored::Colorize;
use std::cell::RefCell;
use std::collections::HashMap;
use std::fmt::Write;
use std::path::{Path, PathBuf};
use std::rc::Rc;
use walkdir::WalkDir;

/// Represents a node in the tree (either file or directory).
#[derive(Debug)]
struct TreeNode {
    name: String,
    children: Vec<Rc<RefCell<TreeNode>>>,
    is_file: bool,
}
impl TreeNode {
    fn new(name: String, is_file: bool) -> Self {
        Self {
            name,
            children: Vec::new(),
            is_file,
        }
    }
}

/// Node counts collected while building the tree, root excluded.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct Totals {
    directories: usize,
    files: usize,
}

/// Build the directory tree from what is on disk under `root`, returning the root node.
fn build_tree(root: &Path) -> Result<(Rc<RefCell<TreeNode>>, Totals), SurveyError> {
    if !root.is_dir() {
        return Err(SurveyError::NotADirectory {
            path: root.to_path_buf(),
        });
    }

    let root_name = root
        .file_name()
        .map(|os| os.to_string_lossy().to_string())
        .unwrap_or_else(|| root.display().to_string());

    let root_node = Rc::new(RefCell::new(TreeNode::new(root_name, false)));

    // map full path to node
    let mut lookup: HashMap<PathBuf, Rc<RefCell<TreeNode>>> = HashMap::new();
    lookup.insert(root.to_path_buf(), Rc::clone(&root_node));

    let mut totals = Totals::default();

    for entry in WalkDir::new(root).min_depth(1).sort_by_file_name() {
        let entry = match entry {
            Ok(e) => e,
            Err(error) => {
                let path = error.path().unwrap_or(root).to_path_buf();

                Err(IoError::new(FileOperation::ReadDir, path, error.into()))?
            }
        };

        let Some(parent_node) = entry.path().parent().and_then(|p| lookup.get(p)) else {
            log::debug!("parent not found for path: {}", entry.path().display());
            continue;
        };

        let is_file = !entry.file_type().is_dir();
        let child_name = entry.file_name().to_string_lossy().to_string();
        let new_child = Rc::new(RefCell::new(TreeNode::new(child_name, is_file)));

        parent_node
            .borrow_mut()
            .children
            .push(Rc::clone(&new_child));

        if is_file {
            totals.files += 1;
        } else {
            totals.directories += 1;
            lookup.insert(entry.path().to_path_buf(), new_child);
        }
    }

    Ok((root_node, totals))
}

fn write_children(out: &mut String, node: &Rc<RefCell<TreeNode>>, prefix: &str) {
    let node_borrow = node.borrow();
    let len = node_borrow.children.len();

    for (i, child) in node_borrow.children.iter().enumerate() {
        let is_last = i == len - 1;
        let child_borrow = child.borrow();

        let connector = if is_last { "└── " } else { "├── " };
        let name = if child_borrow.is_file {
            child_borrow.name.green()
        } else {
            child_borrow.name.blue()
        };
        let _ = writeln!(out, "{}{}{}", prefix.yellow(), connector.yellow(), name);

        let child_prefix = if is_last {
            format!("{}    ", prefix)
        } else {
            format!("{}│   ", prefix)
        };
        write_children(out, child, &child_prefix);
    }
}

/// Renders the tree under `root` the way `tree(1)` does, ending with a
/// `N directories, M files` footer.
pub fn render_tree(root: &Path) -> Result<String, SurveyError> {
    let (tree_root, totals) = build_tree(root)?;

    let mut out = String::new();
    let _ = writeln!(out, "{}", tree_root.borrow().name.blue());
    write_children(&mut out, &tree_root, "");
    let _ = writeln!(
        out,
        "\n{} directories, {} files",
        totals.directories, totals.files
    );

    Ok(out)
}

pub fn print_tree(root: &Path) -> Result<(), SurveyError> {
    println!(
        "Legend: {} = (directory), {} = (file)\n",
        "blue".blue(),
        "green".green()
    );

    print!("{}", render_tree(root)?);

    Ok(())
}
