//! 规则兜底引擎
//!
//! 所有网络 provider 都失败时的最后一道保障，任何输入都会得到非空回复。
//!
//! 两层结构：
//! - 第一层：话题规则（云计算、编程、AI 等），按顺序匹配，先命中者胜出。
//!   云计算的细分规则排在泛化规则之前，避免被遮蔽。
//! - 第二层：对话意图（问候、名字、道别等），仅在第一层未命中时使用。

use rand::seq::SliceRandom;
use std::sync::Arc;

use crate::providers::persona::Persona;
use crate::services::text::NormalizedText;
use crate::storage::UserMemory;

/// 无法识别时随机选用的通用回复
pub const CATCH_ALL_REPLIES: [&str; 5] = [
    "That's interesting! Tell me more about that.",
    "I'm still learning! Can you help me understand better?",
    "Hmm, that's a great point! What do you think about it?",
    "I love chatting with you! What else would you like to know?",
    "That sounds fascinating! I'm always eager to learn new things!",
];

/// 话题规则
pub struct TopicRule {
    /// 话题名称，用于日志
    pub topic: &'static str,
    matches: fn(&NormalizedText) -> bool,
    response: &'static str,
}

impl std::fmt::Debug for TopicRule {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TopicRule").field("topic", &self.topic).finish()
    }
}

/// 第二层对话意图
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConversationIntent {
    Greeting,
    AskName,
    /// 携带提取出的名字，提取失败为 None
    TellName(Option<String>),
    Identity,
    CloudChat,
    WeatherChat,
    Status,
    Capabilities,
    TimeDate,
    Gratitude,
    Farewell,
    Question,
    Unmatched,
}

/// 规则兜底引擎
#[derive(Debug)]
pub struct FallbackRuleEngine {
    persona: Persona,
    memory: Arc<UserMemory>,
    topics: Vec<TopicRule>,
}

impl FallbackRuleEngine {
    pub fn new(persona: Persona, memory: Arc<UserMemory>) -> Self {
        Self {
            persona,
            memory,
            topics: topic_rules(),
        }
    }

    /// 生成回复，总是成功
    pub fn respond(&self, text: &str) -> String {
        let normalized = NormalizedText::new(text);

        if let Some(rule) = self.match_topic(&normalized) {
            tracing::debug!(target: "fallback", topic = rule.topic, "Topic rule matched");
            return self.persona.speak(rule.response);
        }

        let intent = classify_conversation(&normalized);
        tracing::debug!(target: "fallback", ?intent, "Conversational rule matched");
        self.render(intent)
    }

    /// 第一层：返回首个命中的话题规则
    pub fn match_topic(&self, text: &NormalizedText) -> Option<&TopicRule> {
        self.topics.iter().find(|rule| (rule.matches)(text))
    }

    fn render(&self, intent: ConversationIntent) -> String {
        let body = match intent {
            ConversationIntent::Greeting => match self.memory.name() {
                Some(name) => format!(
                    "Hello {name}! Great to see you again! How can I help you today?"
                ),
                None => format!(
                    "Hello! I'm {}, your friendly cloud chatbot! How can I help you today?",
                    self.persona.name()
                ),
            },
            ConversationIntent::AskName => match self.memory.name() {
                Some(name) => format!("Your name is {name}! I remember you! 😊"),
                None => "I don't know your name yet! Could you please tell me what you'd like me to call you?".to_string(),
            },
            ConversationIntent::TellName(Some(name)) => {
                self.memory.remember(&name);
                format!("Nice to meet you, {name}! I'll remember your name. How can I help you today?")
            }
            ConversationIntent::TellName(None) => {
                "Please tell me your name clearly, like 'My name is John' or 'Call me Sarah'!"
                    .to_string()
            }
            ConversationIntent::Identity => format!(
                "I'm {}, your friendly cloud-themed chatbot! I love talking about cloud computing, weather, and helping people. I'm here to chat and assist you with any questions! ☁️✨",
                self.persona.name()
            ),
            ConversationIntent::CloudChat => "Great question about cloud computing! Cloud services offer scalability, flexibility, and cost-effectiveness. Popular providers include AWS, Azure, and Google Cloud Platform.".to_string(),
            ConversationIntent::WeatherChat => "As a cloud, I love talking about weather! ☀️🌧️ I'm always floating around observing the sky!".to_string(),
            ConversationIntent::Status => "I'm doing great! Just floating around in the digital sky, ready to chat with you! ☁️✨".to_string(),
            ConversationIntent::Capabilities => "I can chat with you about many topics! I love discussing cloud computing, weather, answering questions, and having friendly conversations. What would you like to talk about?".to_string(),
            ConversationIntent::TimeDate => "I don't have access to real-time information, but I'm always here to chat whenever you need me! ⏰".to_string(),
            ConversationIntent::Gratitude => "You're very welcome! I'm always happy to help! 😊".to_string(),
            ConversationIntent::Farewell => "Goodbye! It was lovely chatting with you! Come back anytime! 👋☁️".to_string(),
            ConversationIntent::Question => "That's a great question! I'm still learning, but I'd love to help. Could you tell me more about what you're looking for?".to_string(),
            ConversationIntent::Unmatched => CATCH_ALL_REPLIES
                .choose(&mut rand::thread_rng())
                .copied()
                .unwrap_or(CATCH_ALL_REPLIES[0])
                .to_string(),
        };

        self.persona.speak(&body)
    }
}

/// 第二层意图分类，按顺序先命中者胜出
pub fn classify_conversation(text: &NormalizedText) -> ConversationIntent {
    const ASK_NAME: &[&str] = &["what is my name", "what's my name"];
    const NAME_PHRASES: &[&str] = &["my name is", "call me", "i am", "my self", "myself"];

    if text.any_word(&["hello", "hi", "hey", "greetings"]) {
        ConversationIntent::Greeting
    } else if text.any_phrase(ASK_NAME) {
        ConversationIntent::AskName
    } else if text.any_phrase(NAME_PHRASES) {
        ConversationIntent::TellName(extract_name(text.as_str()))
    } else if text.any_phrase(&["tell me about yourself", "who are you", "what are you"]) {
        ConversationIntent::Identity
    } else if text.any_word(&["cloud", "aws", "azure", "gcp"]) || text.has_phrase("google cloud")
    {
        ConversationIntent::CloudChat
    } else if text.any_word(&["weather", "rain", "rainy", "sunny", "storm", "stormy"]) {
        ConversationIntent::WeatherChat
    } else if text.any_phrase(&["how are you", "how do you do", "whats up", "what's up"]) {
        ConversationIntent::Status
    } else if text.any_phrase(&["what can you do", "help me", "can you help"]) {
        ConversationIntent::Capabilities
    } else if text.any_word(&["time", "date", "today", "now"]) {
        ConversationIntent::TimeDate
    } else if text.any_stem(&["thank", "appreciat"]) {
        ConversationIntent::Gratitude
    } else if text.any_word(&["bye", "goodbye", "farewell"]) || text.has_phrase("see you") {
        ConversationIntent::Farewell
    } else if text.as_str().ends_with('?') {
        ConversationIntent::Question
    } else {
        ConversationIntent::Unmatched
    }
}

/// 从自我介绍中提取名字
///
/// 扫描空白分隔的词，取 `is`/`am`（以及 `call me`、`myself`、`my self`）之后的词，
/// 去掉尾部标点并首字母大写；只接受长度大于 1 的纯字母词，第一个合格者胜出。
pub fn extract_name(text: &str) -> Option<String> {
    let lower = text.to_lowercase();
    let words: Vec<&str> = lower.split_whitespace().collect();

    words.iter().enumerate().find_map(|(i, word)| {
        let previous = i.checked_sub(1).map(|p| words[p]);
        let is_marker = matches!(*word, "is" | "am" | "myself")
            || (*word == "me" && previous == Some("call"))
            || (*word == "self" && previous == Some("my"));
        if !is_marker {
            return None;
        }

        let candidate = words.get(i + 1)?.trim_end_matches(['.', ',', '!', '?']);
        let name = capitalize(candidate);
        (name.chars().count() > 1 && name.chars().all(char::is_alphabetic)).then_some(name)
    })
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars.flat_map(char::to_lowercase)).collect(),
        None => String::new(),
    }
}

fn is_cloud_context(t: &NormalizedText) -> bool {
    t.has_phrase("cloud computing")
        || (t.has_word("cloud")
            && (t.has_stem("comput")
                || t.any_stem(&[
                    "service",
                    "provider",
                    "aws",
                    "azure",
                    "gcp",
                    "infrastructure",
                    "server",
                    "storage",
                    "database",
                ])))
}

fn topic_rules() -> Vec<TopicRule> {
    vec![
        TopicRule {
            topic: "cloud_characteristics",
            matches: |t| {
                is_cloud_context(t)
                    && t.has_phrase("what is cloud computing")
                    && t.has_stem("characteristic")
            },
            response: "Cloud computing is the delivery of computing resources like servers, storage, databases, and software over the internet.
Its key characteristics are on-demand access, pay-as-you-go pricing, broad network access, resource pooling, and rapid elasticity.",
        },
        TopicRule {
            topic: "cloud_service_models",
            matches: |t| {
                is_cloud_context(t)
                    && t.has_phrase("types of cloud service")
                    && t.any_word(&["iaas", "paas", "saas"])
            },
            response: "IaaS provides virtualized hardware resources (VMs, storage, networks).
PaaS offers a platform for building, running, and managing applications.
SaaS delivers ready-to-use software over the internet.",
        },
        TopicRule {
            topic: "cloud_virtualization",
            matches: |t| is_cloud_context(t) && t.has_stem("virtuali"),
            response: "Virtualization allows one physical machine to run multiple virtual machines using a hypervisor.
It helps cloud providers efficiently share hardware, isolate users, and scale resources easily.",
        },
        TopicRule {
            topic: "cloud_elasticity",
            matches: |t| is_cloud_context(t) && t.has_word("elasticity") && t.has_word("scalability"),
            response: "Elasticity means resources automatically expand or shrink based on real-time demand.
Scalability means increasing or upgrading resources to handle long-term growth.",
        },
        TopicRule {
            topic: "cloud_computing",
            matches: is_cloud_context,
            response: "Cloud computing is delivering computing services over the internet! Here's the breakdown:

**What It Includes:**
- **Compute**: Virtual servers and processing power
- **Storage**: Scalable data storage solutions
- **Databases**: Managed data management systems
- **Networking**: Global connectivity infrastructure
- **Software**: Applications and services

**Key Benefits:**
✅ Scalability - grow or shrink resources as needed
✅ Cost-effective - pay only for what you use
✅ Flexibility - access from anywhere, anytime
✅ Automatic updates - always current software
✅ Global reach - servers worldwide
✅ Security - enterprise-grade protection

**Major Providers:**
- AWS (Amazon Web Services) - market leader
- Microsoft Azure - enterprise focus
- Google Cloud Platform - data analytics strength

I'm proud to be a cloud chatbot! ☁️",
        },
        TopicRule {
            topic: "oop",
            matches: |t| t.has_word("object") && t.has_word("oriented") || t.has_phrase("object oriented"),
            response: "Object-Oriented Programming (OOP) organizes code into 'objects' that contain data and methods. Key concepts: Classes (blueprints), Objects (instances), Inheritance (reusing code), Encapsulation (hiding details), Polymorphism (multiple forms). Makes code reusable and organized! 🎯",
        },
        TopicRule {
            topic: "programming_examples",
            matches: |t| is_programming(t) && t.any_stem(&["sort", "revers"]),
            response: "Here's a simple Python example:

```python
# Reverse a string
def reverse_string(text):
    return text[::-1]

# Sort a list
def sort_list(items):
    return sorted(items)
```

Would you like me to explain how these work?",
        },
        TopicRule {
            topic: "programming_benefits",
            matches: |t| is_programming(t) && t.has_stem("benefit"),
            response: "Python is great for beginners and experts! It's easy to read, has tons of libraries, works for web development, data science, AI, and automation. Plus, it has a huge community for support! 🐍",
        },
        TopicRule {
            topic: "programming",
            matches: is_programming,
            response: "Python is a versatile programming language! What specific aspect would you like to know about - syntax, libraries, or use cases?",
        },
        TopicRule {
            topic: "artificial_intelligence",
            matches: |t| {
                t.any_phrase(&["artificial intelligence", "machine learning"])
                    || t.has_word("ai")
                    || t.has_stem("neural")
            },
            response: "Artificial Intelligence (AI) is transforming technology! Here's what you need to know:

**Key Components:**
- **Machine Learning (ML)**: Systems learn from data without explicit programming
- **Neural Networks**: Brain-inspired algorithms with interconnected nodes
- **Deep Learning**: Advanced neural networks with multiple layers
- **Natural Language Processing**: Understanding and generating human language

**Real-World Applications:**
- Voice assistants (Siri, Alexa, Google Assistant)
- Recommendation systems (Netflix, Spotify, Amazon)
- Self-driving cars and autonomous vehicles
- Medical diagnosis and drug discovery
- Fraud detection in banking

AI is revolutionizing industries and creating new possibilities every day! 🤖✨",
        },
        TopicRule {
            topic: "quantum_computing",
            matches: |t| t.has_stem("quantum"),
            response: "Quantum computing is the future of computation! Let me explain:

**How It Works:**
- **Classical Bits**: Traditional computers use 0 or 1
- **Quantum Bits (Qubits)**: Can be 0, 1, or BOTH simultaneously (superposition)
- **Entanglement**: Qubits can be mysteriously connected
- **Interference**: Amplify correct answers, cancel wrong ones

**Why It's Powerful:**
- Solves complex problems exponentially faster
- Can process massive datasets simultaneously
- Perfect for optimization, cryptography, and simulation

**Current Applications:**
- Drug discovery and molecular simulation
- Financial modeling and optimization
- Cryptography and security
- Machine learning acceleration

**Challenges:**
- Requires extreme cooling (near absolute zero)
- Quantum decoherence (qubits lose information)
- Error rates still high
- Limited number of qubits available

Companies like IBM, Google, and Microsoft are racing to build practical quantum computers! ⚛️🚀",
        },
        TopicRule {
            topic: "photosynthesis",
            matches: |t| t.has_word("photosynthesis"),
            response: "Photosynthesis is how plants make food! They use sunlight, water, and carbon dioxide to create glucose (sugar) and oxygen. The chlorophyll in leaves captures sunlight energy. Formula: 6CO₂ + 6H₂O + light → C₆H₁₂O₆ + 6O₂ 🌱",
        },
        TopicRule {
            topic: "pythagorean_theorem",
            matches: |t| t.any_stem(&["pythagor"]),
            response: "The Pythagorean theorem states that in a right triangle: a² + b² = c², where c is the hypotenuse (longest side) and a, b are the other two sides. Example: if a=3 and b=4, then c=5 because 3²+4²=9+16=25=5² 📐",
        },
        TopicRule {
            topic: "calculus",
            matches: |t| t.has_word("calculus"),
            response: "Calculus has two main parts: Derivatives (rate of change - like speed from distance) and Integrals (accumulation - like distance from speed). It's used in physics, engineering, economics, and more! Think of it as the math of change and motion. 📊",
        },
        TopicRule {
            topic: "capital_of_france",
            matches: |t| t.has_word("capital") && t.has_word("france"),
            response: "The capital of France is Paris! 🇫🇷 It's known as the 'City of Light' and is famous for the Eiffel Tower, Louvre Museum, and delicious croissants!",
        },
        TopicRule {
            topic: "telephone",
            matches: |t| t.has_stem("telephone") && (t.has_stem("invent") || t.has_word("who")),
            response: "Alexander Graham Bell is credited with inventing the telephone in 1876. However, there's debate as Antonio Meucci developed a similar device earlier. Bell was first to patent it! 📞",
        },
        TopicRule {
            topic: "digital_marketing",
            matches: |t| t.has_word("digital") && t.has_word("marketing"),
            response: "Digital marketing promotes products/services using digital channels like social media, search engines, email, and websites. It includes SEO, content marketing, social media ads, email campaigns, and analytics. It's cost-effective and measurable! 📱",
        },
        TopicRule {
            topic: "supply_chain",
            matches: |t| t.has_phrase("supply chain"),
            response: "Supply chain management oversees the flow of goods from raw materials to final customers. It includes sourcing, production, inventory, warehousing, transportation, and delivery. Good SCM reduces costs and improves efficiency! 📦",
        },
        TopicRule {
            topic: "exercise",
            matches: |t| t.has_stem("exercis") && t.has_stem("benefit"),
            response: "Exercise benefits include: stronger heart and muscles, better mood (endorphins!), weight management, improved sleep, reduced disease risk, more energy, and better brain function. Aim for 30 minutes daily! 💪",
        },
        TopicRule {
            topic: "study_habits",
            matches: |t| t.any_stem(&["study", "studying"]) && t.any_stem(&["habit", "improv"]),
            response: "Great study habits: 1) Set specific goals, 2) Create a schedule, 3) Use active recall (test yourself), 4) Take breaks (Pomodoro technique), 5) Teach others, 6) Stay organized, 7) Get enough sleep. Consistency is key! 📚",
        },
    ]
}

fn is_programming(t: &NormalizedText) -> bool {
    t.any_stem(&["python", "programming", "code", "coding", "function"])
}
