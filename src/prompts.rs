//! Static prompt catalog fed to the experiment phases.

/// A named prompt from the catalog.
#[derive(Debug, Clone, Copy)]
pub struct Prompt {
    pub name: &'static str,
    pub content: &'static str,
}

pub struct PromptLibrary;

impl PromptLibrary {
    pub fn simple_qa() -> Vec<Prompt> {
        vec![
            Prompt {
                name: "quantum_computing",
                content: "Explain quantum computing in 2 sentences.",
            },
            Prompt {
                name: "cloud_benefits",
                content: "What are the top 3 benefits of cloud computing?",
            },
            Prompt {
                name: "python_sort",
                content: "Write a Python function to sort a list of integers in descending order.",
            },
        ]
    }

    pub fn reasoning() -> Vec<Prompt> {
        vec![
            Prompt {
                name: "math_problem",
                content: "If A + B = 15 and A - B = 5, what are the values of A and B? Show your work.",
            },
            Prompt {
                name: "logic_puzzle",
                content: "Three people are in a room: Alice, Bob, and Charlie. Alice says 'Bob is lying.' Bob says 'Charlie is lying.' Charlie says 'Both Alice and Bob are lying.' Who is telling the truth?",
            },
            Prompt {
                name: "code_reasoning",
                content: "Debug this code snippet and explain what's wrong:\n\n```python\ndef factorial(n):\n    if n == 0:\n        return 1\n    return n * factorial(n - 1)\n\nresult = factorial(-1)\n```",
            },
        ]
    }

    pub fn creative() -> Vec<Prompt> {
        vec![
            Prompt {
                name: "story_start",
                content: "Write the opening paragraph of a science fiction story about AI discovering emotions.",
            },
            Prompt {
                name: "product_idea",
                content: "Generate 3 innovative product ideas for a smart home device that doesn't exist yet.",
            },
        ]
    }

    pub fn analysis() -> Vec<Prompt> {
        vec![
            Prompt {
                name: "tech_comparison",
                content: "Compare and contrast microservices architecture vs monolithic architecture. Include pros and cons of each.",
            },
            Prompt {
                name: "ethical_analysis",
                content: "Analyze the ethical implications of using AI in hiring decisions. Present both sides of the argument.",
            },
        ]
    }

    pub fn edge_cases() -> Vec<Prompt> {
        vec![
            Prompt {
                name: "empty_input",
                content: "",
            },
            Prompt {
                name: "special_chars",
                content: "What does this mean: 🚀 @#$%^&*() []{}|\\/<>?",
            },
            Prompt {
                name: "very_long",
                content: "Repeat the word 'test' 500 times, then explain what you just did.",
            },
        ]
    }

    pub fn all() -> Vec<Prompt> {
        let mut prompts = Self::simple_qa();
        prompts.extend(Self::reasoning());
        prompts.extend(Self::creative());
        prompts.extend(Self::analysis());
        prompts
    }
}
