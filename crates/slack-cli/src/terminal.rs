//! Terminal prompts

use std::io::{self, BufRead, Write};
use std::path::{Path, PathBuf};

use token_store::Interaction;

/// Prompts on stderr and reads answers from stdin
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalInteraction;

impl TerminalInteraction {
    fn ask(&self, question: &str) -> Option<PathBuf> {
        let mut stderr = io::stderr();
        let _ = write!(stderr, "{}", question);
        let _ = stderr.flush();

        read_path(&mut io::stdin().lock())
    }
}

/// Read one line and treat it as a path; blank or EOF means no answer
fn read_path(input: &mut impl BufRead) -> Option<PathBuf> {
    let mut line = String::new();
    match input.read_line(&mut line) {
        Ok(0) | Err(_) => None,
        Ok(_) => {
            let line = line.trim();
            if line.is_empty() {
                None
            } else {
                Some(PathBuf::from(line))
            }
        }
    }
}

impl Interaction for TerminalInteraction {
    fn prompt_for_public_key(&self, private_key: &Path) -> Option<PathBuf> {
        eprintln!("No public key found next to {}.", private_key.display());
        self.ask("Path to the matching public key (blank to cancel): ")
    }

    fn prompt_for_decryption_key(&self) -> Option<PathBuf> {
        self.ask("Path to the SSH private key that encrypted your tokens (blank to cancel): ")
    }

    fn info(&self, message: &str) {
        println!("{}", message);
    }

    fn warn(&self, message: &str) {
        eprintln!("warning: {}", message);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn test_read_path() {
        assert_eq!(
            read_path(&mut Cursor::new("  /home/me/.ssh/id_rsa.pub \n")),
            Some(PathBuf::from("/home/me/.ssh/id_rsa.pub"))
        );
        assert_eq!(read_path(&mut Cursor::new("\n")), None);
        assert_eq!(read_path(&mut Cursor::new("")), None);
    }
}
