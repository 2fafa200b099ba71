// Shared instruction fragments appended to every admission prompt.

pub const JSON_ONLY_INSTRUCTION: &str = "Respond with a single JSON object and nothing else. \
Do not wrap it in prose or markdown.";

pub const GROUNDING_INSTRUCTION: &str = "Only use the institutions and cutoff windows listed in \
the input. Never invent institutions, programs, or cutoff numbers. If a candidate is clearly \
out of reach, omit it from the output.";
