// SPDX-FileCopyrightText: 2026 Bruno Meilick
// SPDX-License-Identifier: LicenseRef-Nereid-FreeUse-NoCopy-NoDerivatives
//
// All rights reserved.
//
// This file is part of Mermaide and is proprietary software.
// Unauthorized copying, modification, or distribution is prohibited.

//! Worked examples embedded in prompts.

/// Class diagram before applying "change all int data types to doubles and Duck to Bunny".
pub const ITERATE_BEFORE: &str = r#"classDiagram
    Animal <|-- Duck
    Animal <|-- Fish
    Animal <|-- Zebra
    Animal : +int age
    Animal : +String gender
    Animal: +isMammal()
    Animal: +mate()
    class Duck{
      +String beakColor
      +swim()
      +quack()
    }
    class Fish{
      -int sizeInFeet
      -canEat()
    }
    class Zebra{
      +bool is_wild
      +run()
    }"#;

/// [`ITERATE_BEFORE`] with the requested edit applied and nothing else changed.
pub const ITERATE_AFTER: &str = r#"classDiagram
    Animal <|-- Bunny
    Animal <|-- Fish
    Animal <|-- Zebra
    Animal : +double age
    Animal : +String gender
    Animal: +isMammal()
    Animal: +mate()
    class Bunny{
      +String beakColor
      +swim()
      +quack()
    }
    class Fish{
      -double sizeInFeet
      -canEat()
    }
    class Zebra{
      +bool is_wild
      +run()
    }"#;

/// Flat classes joined by an association, the shape Mermaid needs instead of nesting.
pub const FLAT_CLASSES: &str = r#"classDiagram
    class House {
        string address
        int rooms
        Kitchen kitchen
    }

    class Kitchen {
        string appliances
        int size
    }

    House "1" --> "1" Kitchen : kitchen"#;
