//! Prompt loading (indexed query) and prompt building (PDF pipeline).

use std::path::Path;

use tracing::debug;

use testsmith_shared::{Result, TestsmithError};

/// Appended to the loaded template to form the index query.
const QUERY_SUFFIX: &str = "\n\nPlease follow the prompt";

const UNIT_TEST_PROMPT_HEAD: &str = "\
I have an Ethereum smart contract written in Solidity.
Please generate an extensive set of unit tests for all functions in the contract using Hardhat and ethers.js.
These tests should include:

1. Basic functionality tests for each function.
2. Edge case handling for inputs and outputs.
3. Security vulnerability checks, including:
    - Reentrancy attacks
    - Overflows and underflows
    - Access control (e.g., onlyOwner modifiers)
    - Proper handling of external calls
4. Tests that simulate complex interactions and user scenarios.
5. Ensure proper event emissions are tested.
6. Known common issues with Solidity smart contracts.

Please make sure to:

- Use Hardhat as the testing environment.
- Use ethers.js for interacting with the contract and writing assertions.
- Write the tests in JavaScript, not TypeScript.
- Avoid using web3.js or pytest.

Here is the smart contract code:

";

const UNIT_TEST_PROMPT_TAIL: &str = "

Generate the unit tests in a neatly organized Hardhat-compatible format.
";

/// Read the instruction template verbatim.
pub fn load_prompt(path: &Path) -> Result<String> {
    if !path.is_file() {
        return Err(TestsmithError::PromptFileMissing {
            path: path.to_path_buf(),
        });
    }
    let template = std::fs::read_to_string(path).map_err(|e| TestsmithError::io(path, e))?;
    debug!(path = %path.display(), chars = template.len(), "prompt loaded");
    Ok(template)
}

/// The text sent to the query engine for a loaded template.
pub fn query_text(template: &str) -> String {
    format!("{template}{QUERY_SUFFIX}")
}

/// Embed `contract_text` verbatim into the Hardhat/ethers.js test request.
pub fn build_unit_test_prompt(contract_text: &str) -> String {
    format!("{UNIT_TEST_PROMPT_HEAD}{contract_text}{UNIT_TEST_PROMPT_TAIL}")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn missing_prompt_file() {
        let path = PathBuf::from("/no/such/prompt.txt");
        let err = load_prompt(&path).unwrap_err();
        assert!(matches!(err, TestsmithError::PromptFileMissing { path: p } if p == path));
    }

    #[test]
    fn prompt_read_verbatim() {
        let path = std::env::temp_dir().join(format!("ts_prompt_{}.txt", uuid::Uuid::now_v7()));
        std::fs::write(&path, "Write tests.\n  Keep whitespace.  \n").unwrap();

        assert_eq!(
            load_prompt(&path).unwrap(),
            "Write tests.\n  Keep whitespace.  \n"
        );
        std::fs::remove_file(&path).ok();
    }

    #[test]
    fn query_text_appends_instruction() {
        assert_eq!(
            query_text("Generate tests."),
            "Generate tests.\n\nPlease follow the prompt"
        );
    }

    #[test]
    fn contract_text_is_contiguous_substring() {
        for contract in ["", "contract Foo {}", "line one\n{braces} and {contract_text}\n"] {
            let prompt = build_unit_test_prompt(contract);
            assert!(prompt.contains(contract));
            assert!(prompt.contains(&format!("contract code:\n\n{contract}\n\nGenerate")));
        }
    }

    #[test]
    fn tooling_constraints_are_present() {
        let prompt = build_unit_test_prompt("x");
        for needle in [
            "Hardhat",
            "ethers.js",
            "JavaScript, not TypeScript",
            "web3.js or pytest",
            "Reentrancy",
            "onlyOwner",
            "event emissions",
        ] {
            assert!(prompt.contains(needle), "missing {needle}");
        }
    }
}
